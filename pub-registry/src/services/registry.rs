//! Package catalog, archive ingestion and download resolution.

use std::sync::Arc;
use uuid::Uuid;

use crate::{
    dtos::{
        pub_package::{PubPackageDto, PubVersionDto},
        ListQuery,
    },
    models::{PubPackage, PubVersion, PubVersionSummary},
    services::{
        archive,
        database::Page,
        storage::{archive_key, Storage},
        Database, ServiceError,
    },
};

/// Whether the caller may see private packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    PublicOnly,
    All,
}

impl Visibility {
    pub fn public_only(self) -> bool {
        self == Visibility::PublicOnly
    }
}

#[derive(Clone)]
pub struct RegistryService {
    db: Database,
    storage: Arc<dyn Storage>,
    upstream_url: Option<String>,
}

impl RegistryService {
    pub fn new(db: Database, storage: Arc<dyn Storage>, upstream_url: Option<String>) -> Self {
        Self {
            db,
            storage,
            upstream_url,
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Existence then visibility: a private package is Forbidden to public-only
    /// callers whether or not the requested version exists.
    async fn visible_package(
        &self,
        name: &str,
        visibility: Visibility,
    ) -> Result<PubPackage, ServiceError> {
        let package = self
            .db
            .find_package(name)
            .await?
            .ok_or(ServiceError::PackageNotFound)?;

        if package.private && visibility.public_only() {
            return Err(ServiceError::Forbidden);
        }

        Ok(package)
    }

    pub async fn version_list(
        &self,
        name: &str,
        base_url: &str,
        visibility: Visibility,
    ) -> Result<PubPackageDto, ServiceError> {
        self.visible_package(name, visibility).await?;

        let versions = self.db.list_versions(name).await?;
        if versions.is_empty() {
            return Err(ServiceError::PackageNotFound);
        }

        Ok(PubPackageDto::from_versions(name, &versions, base_url))
    }

    pub async fn version_detail(
        &self,
        name: &str,
        version: &str,
        base_url: &str,
        visibility: Visibility,
    ) -> Result<PubVersionDto, ServiceError> {
        self.visible_package(name, visibility).await?;

        let row = self
            .db
            .find_version(name, version)
            .await?
            .ok_or(ServiceError::VersionNotFound)?;

        Ok(PubVersionDto::from_model(&row, base_url))
    }

    pub async fn download_url(
        &self,
        name: &str,
        version: &str,
        base_url: &str,
        visibility: Visibility,
    ) -> Result<String, ServiceError> {
        self.visible_package(name, visibility).await?;

        if self.db.find_version(name, version).await?.is_none() {
            return Err(ServiceError::VersionNotFound);
        }

        self.storage.url(&archive_key(name, version), base_url).await
    }

    /// Archive bytes from storage, for backends without their own public URL.
    pub async fn read_archive(
        &self,
        name: &str,
        version: &str,
        visibility: Visibility,
    ) -> Result<Vec<u8>, ServiceError> {
        self.visible_package(name, visibility).await?;
        self.storage.download(&archive_key(name, version)).await
    }

    /// Mirror location for a path this registry cannot serve.
    pub fn upstream_url(&self, path: &str) -> Option<String> {
        self.upstream_url
            .as_ref()
            .map(|upstream| format!("{}{}", upstream, path))
    }

    /// Ingest an uploaded archive. The package row is created (private) if absent,
    /// the archive is stored, then the version row is upserted.
    pub async fn upload_version(
        &self,
        data: Vec<u8>,
        uploader_id: Option<Uuid>,
    ) -> Result<PubVersion, ServiceError> {
        // gzip and tar decoding are CPU bound; keep them off the async workers
        let (data, new_version) = tokio::task::spawn_blocking(move || {
            let inspected = archive::inspect_upload(&data, uploader_id);
            (data, inspected)
        })
        .await
        .map_err(|e| ServiceError::Internal(e.into()))?;
        let new_version = new_version?;
        let package = new_version.package_name.clone();
        let version = new_version.version.clone();

        self.db.insert_package_if_absent(&package).await?;

        let key = archive_key(&package, &version);
        self.storage.upload(&key, data).await?;

        let stored = self.db.upsert_version(&new_version).await?;

        tracing::info!(
            package = %package,
            version = %version,
            key = %key,
            uploader_id = ?uploader_id,
            "Package version uploaded"
        );

        Ok(stored)
    }

    pub async fn query_packages(
        &self,
        query: &ListQuery,
        visibility: Visibility,
    ) -> Result<Page<PubPackage>, ServiceError> {
        Ok(self
            .db
            .list_packages(
                query.search(),
                visibility.public_only(),
                query.page(),
                query.limit(),
            )
            .await?)
    }

    pub async fn update_package(
        &self,
        name: &str,
        private: bool,
    ) -> Result<PubPackage, ServiceError> {
        let package = self
            .db
            .update_package_visibility(name, private)
            .await?
            .ok_or(ServiceError::PackageNotFound)?;

        tracing::info!(package = %name, private, "Package visibility updated");
        Ok(package)
    }

    /// Management listing hides private packages from public-only callers as NotFound.
    async fn queryable_package(
        &self,
        name: &str,
        visibility: Visibility,
    ) -> Result<PubPackage, ServiceError> {
        match self.visible_package(name, visibility).await {
            Err(ServiceError::Forbidden) => Err(ServiceError::PackageNotFound),
            other => other,
        }
    }

    pub async fn query_versions(
        &self,
        name: &str,
        query: &ListQuery,
        visibility: Visibility,
    ) -> Result<Page<PubVersionSummary>, ServiceError> {
        self.queryable_package(name, visibility).await?;

        Ok(self
            .db
            .list_version_summaries(name, query.search(), query.page(), query.limit())
            .await?)
    }

    pub async fn query_version_detail(
        &self,
        name: &str,
        version: &str,
        visibility: Visibility,
    ) -> Result<PubVersion, ServiceError> {
        self.queryable_package(name, visibility).await?;

        self.db
            .find_version(name, version)
            .await?
            .ok_or(ServiceError::VersionNotFound)
    }
}
