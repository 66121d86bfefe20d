use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub app_code: String,
    pub base_url: Option<String>,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub otp_expiry_minutes: i64,
    pub smtp: SmtpConfig,
    pub storage: StorageConfig,
    pub upstream_url: Option<String>,
    pub max_upload_size_mb: usize,
    pub allowed_origins: Vec<String>,
    pub rate_limit: RateLimitConfig,
    pub seed_admin: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub token_lifetime_minutes: i64,
    pub refresh_lifetime_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    S3,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub local_path: String,
    pub s3: S3Config,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub public_endpoint: Option<String>,
    pub key_id: Option<String>,
    pub access_key: Option<String>,
    pub use_path_style: bool,
    pub enable_presign: bool,
    pub presign_minutes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub password_reset_attempts: u32,
    pub password_reset_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
}

const DEV_JWT_SECRET: &str = "dev-only-secret-change-me-before-deploying";

impl RegistryConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        Self::from_lookup(common_config, |key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_str = lookup("ENVIRONMENT").unwrap_or_else(|| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;
        let get = |key: &str, default: Option<&str>, required_in_prod: bool| {
            get_env(&lookup, key, default, is_prod && required_in_prod)
        };

        let s3_endpoint = get_optional_env(&lookup, "S3_ENDPOINT");

        let config = RegistryConfig {
            common,
            environment: environment.clone(),
            service_name: get("SERVICE_NAME", Some("pub-registry"), false)?,
            service_version: get("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), false)?,
            log_level: get("LOG_LEVEL", Some("info"), false)?,
            app_code: get("APP_CODE", Some("APP"), false)?,
            base_url: get_optional_env(&lookup, "BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            database: DatabaseConfig {
                url: get("DATABASE_URL", None, true)?,
                max_connections: parse(get("DATABASE_MAX_CONNECTIONS", Some("10"), false)?)?,
                min_connections: parse(get("DATABASE_MIN_CONNECTIONS", Some("1"), false)?)?,
                auto_migrate: parse_flag(&get("DB_AUTOMIGRATION", Some("true"), false)?),
            },
            jwt: JwtConfig {
                secret: get("JWT_SECRET", Some(DEV_JWT_SECRET), true)?,
                token_lifetime_minutes: parse(get("JWT_TOKEN_LIFETIME", Some("60"), false)?)?,
                refresh_lifetime_minutes: parse(get(
                    "JWT_REFRESH_LIFETIME",
                    Some("1440"),
                    false,
                )?)?,
            },
            otp_expiry_minutes: parse(get("OTP_EXPIRED_TIME", Some("5"), false)?)?,
            smtp: SmtpConfig {
                host: get("SMTP_HOST", Some("localhost"), true)?,
                port: parse(get("SMTP_PORT", Some("587"), false)?)?,
                username: get("SMTP_USERNAME", Some(""), true)?,
                password: get("SMTP_PASSWORD", Some(""), true)?,
                from_email: get("SMTP_FROM_EMAIL", Some("noreply@localhost"), true)?,
                from_name: get("SMTP_FROM_NAME", Some("Pub Registry"), false)?,
            },
            storage: StorageConfig {
                backend: get("STORAGE_BACKEND", Some("local"), false)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
                local_path: get("STORAGE_LOCAL_PATH", Some("storage"), false)?,
                s3: S3Config {
                    bucket: get("S3_BUCKET", Some(""), false)?,
                    region: get("S3_REGION", Some("us-east-1"), false)?,
                    public_endpoint: get_optional_env(&lookup, "S3_PUBLIC_ENDPOINT")
                        .or_else(|| s3_endpoint.clone()),
                    endpoint: s3_endpoint,
                    key_id: get_optional_env(&lookup, "S3_KEY_ID"),
                    access_key: get_optional_env(&lookup, "S3_ACCESS_KEY"),
                    use_path_style: parse_flag(&get("S3_USE_PATH_STYLE", Some("false"), false)?),
                    enable_presign: parse_flag(&get("S3_ENABLE_PRESIGN", Some("false"), false)?),
                    presign_minutes: parse(get("S3_PRESIGN_TIME", Some("15"), false)?)?,
                },
            },
            upstream_url: get_optional_env(&lookup, "UPSTREAM_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            max_upload_size_mb: parse(get("MAX_UPLOAD_SIZE_MB", Some("100"), false)?)?,
            allowed_origins: get("ALLOWED_ORIGINS", Some("*"), false)?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            rate_limit: RateLimitConfig {
                login_attempts: get("RATE_LIMIT_LOGIN_ATTEMPTS", Some("5"), false)?
                    .parse()
                    .unwrap_or(5),
                login_window_seconds: get("RATE_LIMIT_LOGIN_WINDOW_SECONDS", Some("60"), false)?
                    .parse()
                    .unwrap_or(60),
                password_reset_attempts: get(
                    "RATE_LIMIT_PASSWORD_RESET_ATTEMPTS",
                    Some("3"),
                    false,
                )?
                .parse()
                .unwrap_or(3),
                password_reset_window_seconds: get(
                    "RATE_LIMIT_PASSWORD_RESET_WINDOW_SECONDS",
                    Some("3600"),
                    false,
                )?
                .parse()
                .unwrap_or(3600),
                global_ip_limit: get("RATE_LIMIT_GLOBAL_IP", Some("300"), false)?
                    .parse()
                    .unwrap_or(300),
                global_ip_window_seconds: get(
                    "RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS",
                    Some("60"),
                    false,
                )?
                .parse()
                .unwrap_or(60),
            },
            seed_admin: parse_flag(&get("SEED_ADMIN", Some("true"), false)?),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.jwt.token_lifetime_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_TOKEN_LIFETIME must be positive"
            )));
        }

        if self.jwt.refresh_lifetime_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_REFRESH_LIFETIME must be positive"
            )));
        }

        if self.otp_expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "OTP_EXPIRED_TIME must be positive"
            )));
        }

        if self.storage.backend == StorageBackend::S3 && self.storage.s3.bucket.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "S3_BUCKET is required when STORAGE_BACKEND is s3"
            )));
        }

        if self.environment == Environment::Prod {
            if self.jwt.secret.len() < 32 {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "JWT_SECRET must be at least 32 bytes in production"
                )));
            }

            if self.allowed_origins.iter().any(|o| o == "*") {
                tracing::warn!("Wildcard CORS origin in production");
            }
        } else if self.jwt.secret.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_SECRET must not be empty"
            )));
        }

        Ok(())
    }

    pub fn is_prod(&self) -> bool {
        self.environment == Environment::Prod
    }
}

fn get_env<F>(
    lookup: &F,
    key: &str,
    default: Option<&str>,
    is_prod: bool,
) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => Ok(val),
        None => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn get_optional_env<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn parse<T>(value: String) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!(e.to_string())))
}

fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "s3" => Ok(StorageBackend::S3),
            _ => Err(format!("Invalid storage backend: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn common() -> core_config::Config {
        core_config::Config::default()
    }

    fn load(vars: &[(&str, &str)]) -> Result<RegistryConfig, AppError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RegistryConfig::from_lookup(common(), |key| map.get(key).cloned())
    }

    #[test]
    fn test_dev_defaults() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/pub")]).unwrap();

        assert_eq!(config.environment, Environment::Dev);
        assert_eq!(config.app_code, "APP");
        assert_eq!(config.jwt.token_lifetime_minutes, 60);
        assert_eq!(config.jwt.refresh_lifetime_minutes, 1440);
        assert_eq!(config.otp_expiry_minutes, 5);
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.storage.s3.presign_minutes, 15);
        assert_eq!(config.allowed_origins, vec!["*".to_string()]);
        assert!(config.database.auto_migrate);
        assert!(config.seed_admin);
        assert!(config.upstream_url.is_none());
    }

    #[test]
    fn test_database_url_is_required() {
        assert!(load(&[]).is_err());
    }

    #[test]
    fn test_s3_backend_requires_bucket() {
        let result = load(&[
            ("DATABASE_URL", "postgres://localhost/pub"),
            ("STORAGE_BACKEND", "s3"),
        ]);
        assert!(result.is_err());

        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/pub"),
            ("STORAGE_BACKEND", "S3"),
            ("S3_BUCKET", "packages"),
            ("S3_ENDPOINT", "http://minio:9000"),
            ("S3_USE_PATH_STYLE", "true"),
        ])
        .unwrap();
        assert_eq!(config.storage.backend, StorageBackend::S3);
        assert_eq!(
            config.storage.s3.public_endpoint.as_deref(),
            Some("http://minio:9000")
        );
        assert!(config.storage.s3.use_path_style);
        assert!(!config.storage.s3.enable_presign);
    }

    #[test]
    fn test_prod_requires_secrets() {
        let result = load(&[
            ("ENVIRONMENT", "prod"),
            ("DATABASE_URL", "postgres://db/pub"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_prod_rejects_short_secret() {
        let result = load(&[
            ("ENVIRONMENT", "prod"),
            ("DATABASE_URL", "postgres://db/pub"),
            ("JWT_SECRET", "too-short"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_USERNAME", "mailer"),
            ("SMTP_PASSWORD", "secret"),
            ("SMTP_FROM_EMAIL", "noreply@example.com"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_upstream_and_base_url_trailing_slash_trimmed() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/pub"),
            ("UPSTREAM_URL", "https://pub.dev/"),
            ("BASE_URL", "https://pub.example.com/"),
        ])
        .unwrap();
        assert_eq!(config.upstream_url.as_deref(), Some("https://pub.dev"));
        assert_eq!(config.base_url.as_deref(), Some("https://pub.example.com"));
    }

    #[test]
    fn test_invalid_environment() {
        assert!(load(&[("ENVIRONMENT", "staging")]).is_err());
    }

    #[test]
    fn test_non_positive_lifetime_rejected() {
        let result = load(&[
            ("DATABASE_URL", "postgres://localhost/pub"),
            ("JWT_TOKEN_LIFETIME", "0"),
        ]);
        assert!(result.is_err());
    }
}
