use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::config::{S3Config, StorageBackend, StorageConfig};
use crate::services::ServiceError;

/// Route prefix under which the local backend serves stored objects.
pub const LOCAL_STORAGE_ROUTE: &str = "/storage";

#[async_trait]
pub trait Storage: Send + Sync {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), ServiceError>;
    async fn download(&self, key: &str) -> Result<Vec<u8>, ServiceError>;
    /// Retrieval URL for `key`. `base_url` is the public base of this service.
    async fn url(&self, key: &str, base_url: &str) -> Result<String, ServiceError>;
}

/// Storage key of a version archive.
pub fn archive_key(package: &str, version: &str) -> String {
    format!("packages/{}/versions/{}.tar.gz", package, version)
}

pub async fn from_config(config: &StorageConfig) -> Result<Box<dyn Storage>, ServiceError> {
    match config.backend {
        StorageBackend::Local => Ok(Box::new(LocalStorage::new(&config.local_path).await?)),
        StorageBackend::S3 => Ok(Box::new(S3Storage::from_config(&config.s3).await)),
    }
}

pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, ServiceError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path)
                .await
                .map_err(|e| ServiceError::Storage(e.to_string()))?;
        }
        tracing::info!(path = %base_path.display(), "Local storage initialized");
        Ok(Self { base_path })
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, ServiceError> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !safe {
            return Err(ServiceError::Storage(format!("Invalid storage key: {}", key)));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), ServiceError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ServiceError::Storage(e.to_string()))?;
        }
        fs::write(path, data)
            .await
            .map_err(|e| ServiceError::Storage(e.to_string()))?;
        tracing::debug!(key = %key, "Stored object on local disk");
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, ServiceError> {
        let path = self.resolve(key)?;
        fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ServiceError::VersionNotFound,
            _ => ServiceError::Storage(e.to_string()),
        })
    }

    async fn url(&self, key: &str, base_url: &str) -> Result<String, ServiceError> {
        self.resolve(key)?;
        Ok(format!("{}{}/{}", base_url, LOCAL_STORAGE_ROUTE, key))
    }
}

pub struct S3Storage {
    client: S3Client,
    public_client: S3Client,
    bucket: String,
    region: String,
    public_endpoint: Option<String>,
    use_path_style: bool,
    presign_expiry: Option<Duration>,
}

impl S3Storage {
    /// Builds one client for the internal endpoint and one for the endpoint clients
    /// download from; presigned URLs must be signed for the host the client will hit.
    pub async fn from_config(config: &S3Config) -> Self {
        let client = build_client(config, config.endpoint.as_deref()).await;
        let public_client = build_client(config, config.public_endpoint.as_deref()).await;

        tracing::info!(
            bucket = %config.bucket,
            presign = config.enable_presign,
            path_style = config.use_path_style,
            "S3 storage initialized"
        );

        Self {
            client,
            public_client,
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            public_endpoint: config.public_endpoint.clone(),
            use_path_style: config.use_path_style,
            presign_expiry: config
                .enable_presign
                .then(|| Duration::from_secs(config.presign_minutes * 60)),
        }
    }
}

async fn build_client(config: &S3Config, endpoint: Option<&str>) -> S3Client {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_sdk_s3::config::Region::new(config.region.clone()));

    if let (Some(key_id), Some(access_key)) = (&config.key_id, &config.access_key) {
        loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
            key_id.clone(),
            access_key.clone(),
            None,
            None,
            "pub-registry",
        ));
    }

    let shared = loader.load().await;
    let mut builder =
        aws_sdk_s3::config::Builder::from(&shared).force_path_style(config.use_path_style);
    if let Some(endpoint) = endpoint {
        builder = builder.endpoint_url(endpoint);
    }

    S3Client::from_conf(builder.build())
}

/// Plain (unsigned) object URL.
pub fn object_url(
    endpoint: Option<&str>,
    bucket: &str,
    region: &str,
    key: &str,
    path_style: bool,
) -> String {
    match endpoint.map(|e| e.trim_end_matches('/')) {
        Some(endpoint) if path_style => format!("{}/{}/{}", endpoint, bucket, key),
        Some(endpoint) => match endpoint.split_once("://") {
            Some((scheme, host)) => format!("{}://{}.{}/{}", scheme, bucket, host, key),
            None => format!("https://{}.{}/{}", bucket, endpoint, key),
        },
        None if path_style => format!("https://s3.{}.amazonaws.com/{}/{}", region, bucket, key),
        None => format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key),
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), ServiceError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/octet-stream")
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| ServiceError::Storage(format!("S3 upload failed: {}", e)))?;
        tracing::debug!(key = %key, bucket = %self.bucket, "Stored object in S3");
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, ServiceError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ServiceError::Storage(format!("S3 download failed: {}", e)))?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| ServiceError::Storage(format!("S3 body collection failed: {}", e)))?
            .into_bytes()
            .to_vec();

        Ok(data)
    }

    async fn url(&self, key: &str, _base_url: &str) -> Result<String, ServiceError> {
        let Some(expiry) = self.presign_expiry else {
            return Ok(object_url(
                self.public_endpoint.as_deref(),
                &self.bucket,
                &self.region,
                key,
                self.use_path_style,
            ));
        };

        let presigning = PresigningConfig::expires_in(expiry)
            .map_err(|e| ServiceError::Storage(format!("Invalid presign expiry: {}", e)))?;
        let request = self
            .public_client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| ServiceError::Storage(format!("S3 presign failed: {}", e)))?;

        Ok(request.uri().to_string())
    }
}
