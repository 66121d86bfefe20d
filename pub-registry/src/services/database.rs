//! Database service for pub-registry.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::{
    NewPubVersion, OtpPurpose, PubPackage, PubToken, PubVersion, PubVersionSummary, User, UserOtp,
};

const USER_COLUMNS: &str =
    "id, name, email, password, is_admin, can_write, created_at, updated_at, deleted_at";
const PUB_TOKEN_COLUMNS: &str =
    "id, remarks, read, write, expired_at, user_id, created_at, updated_at";
const PACKAGE_COLUMNS: &str = "name, private, created_at, updated_at, deleted_at";
const VERSION_COLUMNS: &str = "package_name, version, version_number_major, version_number_minor, \
     version_number_patch, prerelease, pubspec, uploader_id, readme, changelog, created_at, \
     updated_at, deleted_at";

/// Newest first by number; releases before prereleases of the same number, then
/// the version string so `+build` variants come back in a fixed order.
const VERSION_ORDER: &str = "version_number_major DESC, version_number_minor DESC, \
     version_number_patch DESC, prerelease ASC, version COLLATE \"C\" DESC";

/// One page of rows plus the total row count for the same filter.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub total: i64,
}

/// `%term%` pattern for ILIKE, with LIKE wildcards in the term escaped.
pub fn search_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let escaped = s
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{}%", escaped)
        })
}

fn offset(page: i64, limit: i64) -> i64 {
    (page.max(1) - 1).saturating_mul(limit.max(0))
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // =========================================================================
    // Users
    // =========================================================================

    #[instrument(skip(self))]
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1) AND deleted_at IS NULL",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1 AND deleted_at IS NULL",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn insert_user(&self, user: &User) -> Result<User, sqlx::Error> {
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, name, email, password, is_admin, can_write, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password)
        .bind(user.is_admin)
        .bind(user.can_write)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await?;

        info!(user_id = %created.id, "User created");
        Ok(created)
    }

    /// Insert `user` unless a row with its id or active email already exists.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn insert_user_if_absent(&self, user: &User) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password, is_admin, can_write, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password)
        .bind(user.is_admin)
        .bind(user.can_write)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    pub async fn list_users(
        &self,
        search: Option<&str>,
        page: i64,
        limit: i64,
    ) -> Result<Page<User>, sqlx::Error> {
        let pattern = search_pattern(search);

        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE deleted_at IS NULL AND ($1::text IS NULL OR name ILIKE $1)",
        )
        .bind(&pattern)
        .fetch_one(&self.pool);

        let sql = format!(
            r#"
            SELECT {} FROM users
            WHERE deleted_at IS NULL AND ($1::text IS NULL OR name ILIKE $1)
            ORDER BY name ASC, created_at ASC
            LIMIT $2 OFFSET $3
            "#,
            USER_COLUMNS
        );
        let rows = sqlx::query_as::<_, User>(&sql)
            .bind(&pattern)
            .bind(limit)
            .bind(offset(page, limit))
            .fetch_all(&self.pool);

        let (total, rows) = tokio::try_join!(count, rows)?;
        Ok(Page { rows, total })
    }

    /// Partial update; `None` fields keep their value.
    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn update_user(
        &self,
        id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
        is_admin: Option<bool>,
        can_write: Option<bool>,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                is_admin = COALESCE($4, is_admin),
                can_write = COALESCE($5, can_write),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(is_admin)
        .bind(can_write)
        .fetch_optional(&self.pool)
        .await
    }

    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn soft_delete_user(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // One-time passwords
    // =========================================================================

    /// Replace any pending OTP of the same purpose for the user.
    #[instrument(skip(self, otp_hash), fields(user_id = %user_id))]
    pub async fn upsert_otp(
        &self,
        user_id: Uuid,
        purpose: OtpPurpose,
        otp_hash: &str,
        expired_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO user_otps (user_id, purpose, otp, expired_at, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (user_id, purpose)
            DO UPDATE SET otp = EXCLUDED.otp, expired_at = EXCLUDED.expired_at, created_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(purpose.as_str())
        .bind(otp_hash)
        .bind(expired_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn find_otp(
        &self,
        user_id: Uuid,
        purpose: OtpPurpose,
    ) -> Result<Option<UserOtp>, sqlx::Error> {
        sqlx::query_as::<_, UserOtp>(
            "SELECT user_id, purpose, otp, expired_at, created_at FROM user_otps WHERE user_id = $1 AND purpose = $2",
        )
        .bind(user_id)
        .bind(purpose.as_str())
        .fetch_optional(&self.pool)
        .await
    }

    /// Store the new password hash and consume the OTP in one transaction.
    #[instrument(skip(self, password_hash), fields(user_id = %user_id))]
    pub async fn reset_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
        purpose: OtpPurpose,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE users SET password = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM user_otps WHERE user_id = $1 AND purpose = $2")
            .bind(user_id)
            .bind(purpose.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(user_id = %user_id, "Password reset");
        Ok(())
    }

    // =========================================================================
    // Pub tokens
    // =========================================================================

    #[instrument(skip(self, token), fields(token_id = %token.id))]
    pub async fn insert_pub_token(&self, token: &PubToken) -> Result<PubToken, sqlx::Error> {
        sqlx::query_as::<_, PubToken>(&format!(
            r#"
            INSERT INTO pub_tokens (id, remarks, read, write, expired_at, user_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            PUB_TOKEN_COLUMNS
        ))
        .bind(token.id)
        .bind(&token.remarks)
        .bind(token.read)
        .bind(token.write)
        .bind(token.expired_at)
        .bind(token.user_id)
        .bind(token.created_at)
        .bind(token.updated_at)
        .fetch_one(&self.pool)
        .await
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_pub_tokens(
        &self,
        user_id: Uuid,
        search: Option<&str>,
        page: i64,
        limit: i64,
    ) -> Result<Page<PubToken>, sqlx::Error> {
        let pattern = search_pattern(search);

        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM pub_tokens WHERE user_id = $1 AND ($2::text IS NULL OR remarks ILIKE $2)",
        )
        .bind(user_id)
        .bind(&pattern)
        .fetch_one(&self.pool);

        let sql = format!(
            r#"
            SELECT {} FROM pub_tokens
            WHERE user_id = $1 AND ($2::text IS NULL OR remarks ILIKE $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
            PUB_TOKEN_COLUMNS
        );
        let rows = sqlx::query_as::<_, PubToken>(&sql)
            .bind(user_id)
            .bind(&pattern)
            .bind(limit)
            .bind(offset(page, limit))
            .fetch_all(&self.pool);

        let (total, rows) = tokio::try_join!(count, rows)?;
        Ok(Page { rows, total })
    }

    #[instrument(skip(self), fields(token_id = %id, user_id = %user_id))]
    pub async fn find_pub_token(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<PubToken>, sqlx::Error> {
        sqlx::query_as::<_, PubToken>(&format!(
            "SELECT {} FROM pub_tokens WHERE id = $1 AND user_id = $2",
            PUB_TOKEN_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Token by id, only while its owner is an active user.
    #[instrument(skip(self), fields(token_id = %id))]
    pub async fn find_active_pub_token(&self, id: Uuid) -> Result<Option<PubToken>, sqlx::Error> {
        sqlx::query_as::<_, PubToken>(
            r#"
            SELECT t.id, t.remarks, t.read, t.write, t.expired_at, t.user_id, t.created_at, t.updated_at
            FROM pub_tokens t
            JOIN users u ON u.id = t.user_id
            WHERE t.id = $1 AND u.deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    #[instrument(skip(self), fields(token_id = %id, user_id = %user_id))]
    pub async fn update_pub_token(
        &self,
        id: Uuid,
        user_id: Uuid,
        remarks: Option<&str>,
        read: Option<bool>,
        write: Option<bool>,
    ) -> Result<Option<PubToken>, sqlx::Error> {
        sqlx::query_as::<_, PubToken>(&format!(
            r#"
            UPDATE pub_tokens SET
                remarks = COALESCE($3, remarks),
                read = COALESCE($4, read),
                write = COALESCE($5, write),
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {}
            "#,
            PUB_TOKEN_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .bind(remarks)
        .bind(read)
        .bind(write)
        .fetch_optional(&self.pool)
        .await
    }

    #[instrument(skip(self), fields(token_id = %id, user_id = %user_id))]
    pub async fn delete_pub_token(&self, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM pub_tokens WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Packages and versions
    // =========================================================================

    #[instrument(skip(self), fields(package = %name))]
    pub async fn find_package(&self, name: &str) -> Result<Option<PubPackage>, sqlx::Error> {
        sqlx::query_as::<_, PubPackage>(&format!(
            "SELECT {} FROM pub_packages WHERE name = $1 AND deleted_at IS NULL",
            PACKAGE_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
    }

    /// Create the package with default visibility; an existing row is left untouched.
    #[instrument(skip(self), fields(package = %name))]
    pub async fn insert_package_if_absent(&self, name: &str) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO pub_packages (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_packages(
        &self,
        search: Option<&str>,
        public_only: bool,
        page: i64,
        limit: i64,
    ) -> Result<Page<PubPackage>, sqlx::Error> {
        let pattern = search_pattern(search);
        let filter = "deleted_at IS NULL AND ($1::text IS NULL OR name ILIKE $1) AND (NOT $2 OR private = FALSE)";

        let count_sql = format!("SELECT COUNT(*) FROM pub_packages WHERE {}", filter);
        let count = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(&pattern)
            .bind(public_only)
            .fetch_one(&self.pool);

        let sql = format!(
            "SELECT {} FROM pub_packages WHERE {} ORDER BY name ASC LIMIT $3 OFFSET $4",
            PACKAGE_COLUMNS, filter
        );
        let rows = sqlx::query_as::<_, PubPackage>(&sql)
            .bind(&pattern)
            .bind(public_only)
            .bind(limit)
            .bind(offset(page, limit))
            .fetch_all(&self.pool);

        let (total, rows) = tokio::try_join!(count, rows)?;
        Ok(Page { rows, total })
    }

    #[instrument(skip(self), fields(package = %name))]
    pub async fn update_package_visibility(
        &self,
        name: &str,
        private: bool,
    ) -> Result<Option<PubPackage>, sqlx::Error> {
        sqlx::query_as::<_, PubPackage>(&format!(
            r#"
            UPDATE pub_packages SET private = $2, updated_at = NOW()
            WHERE name = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            PACKAGE_COLUMNS
        ))
        .bind(name)
        .bind(private)
        .fetch_optional(&self.pool)
        .await
    }

    /// All versions of a package in [`VERSION_ORDER`].
    #[instrument(skip(self), fields(package = %name))]
    pub async fn list_versions(&self, name: &str) -> Result<Vec<PubVersion>, sqlx::Error> {
        sqlx::query_as::<_, PubVersion>(&format!(
            r#"
            SELECT {} FROM pub_versions
            WHERE package_name = $1 AND deleted_at IS NULL
            ORDER BY {}
            "#,
            VERSION_COLUMNS, VERSION_ORDER
        ))
        .bind(name)
        .fetch_all(&self.pool)
        .await
    }

    #[instrument(skip(self))]
    pub async fn list_version_summaries(
        &self,
        name: &str,
        search: Option<&str>,
        page: i64,
        limit: i64,
    ) -> Result<Page<PubVersionSummary>, sqlx::Error> {
        let pattern = search_pattern(search);
        let filter = "package_name = $1 AND deleted_at IS NULL AND ($2::text IS NULL OR version ILIKE $2)";

        let count_sql = format!("SELECT COUNT(*) FROM pub_versions WHERE {}", filter);
        let count = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(name)
            .bind(&pattern)
            .fetch_one(&self.pool);

        let sql = format!(
            r#"
            SELECT package_name, version, created_at, updated_at FROM pub_versions
            WHERE {}
            ORDER BY {}
            LIMIT $3 OFFSET $4
            "#,
            filter, VERSION_ORDER
        );
        let rows = sqlx::query_as::<_, PubVersionSummary>(&sql)
            .bind(name)
            .bind(&pattern)
            .bind(limit)
            .bind(offset(page, limit))
            .fetch_all(&self.pool);

        let (total, rows) = tokio::try_join!(count, rows)?;
        Ok(Page { rows, total })
    }

    #[instrument(skip(self), fields(package = %name, version = %version))]
    pub async fn find_version(
        &self,
        name: &str,
        version: &str,
    ) -> Result<Option<PubVersion>, sqlx::Error> {
        sqlx::query_as::<_, PubVersion>(&format!(
            "SELECT {} FROM pub_versions WHERE package_name = $1 AND version = $2 AND deleted_at IS NULL",
            VERSION_COLUMNS
        ))
        .bind(name)
        .bind(version)
        .fetch_optional(&self.pool)
        .await
    }

    /// Insert a version, or on re-upload replace its manifest, readme, changelog and
    /// uploader. Version number columns are only written on insert.
    #[instrument(skip(self, version), fields(package = %version.package_name, version = %version.version))]
    pub async fn upsert_version(&self, version: &NewPubVersion) -> Result<PubVersion, sqlx::Error> {
        let row = sqlx::query_as::<_, PubVersion>(&format!(
            r#"
            INSERT INTO pub_versions (
                package_name, version, version_number_major, version_number_minor,
                version_number_patch, prerelease, pubspec, uploader_id, readme, changelog
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (package_name, version) DO UPDATE SET
                readme = EXCLUDED.readme,
                changelog = EXCLUDED.changelog,
                pubspec = EXCLUDED.pubspec,
                uploader_id = EXCLUDED.uploader_id,
                updated_at = NOW()
            RETURNING {}
            "#,
            VERSION_COLUMNS
        ))
        .bind(&version.package_name)
        .bind(&version.version)
        .bind(version.major)
        .bind(version.minor)
        .bind(version.patch)
        .bind(version.prerelease)
        .bind(&version.pubspec)
        .bind(version.uploader_id)
        .bind(&version.readme)
        .bind(&version.changelog)
        .fetch_one(&self.pool)
        .await?;

        info!(package = %row.package_name, version = %row.version, "Version stored");
        Ok(row)
    }
}
