use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::PubVersion;

/// Version entry as the pub client expects it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PubVersionDto {
    pub version: String,
    pub archive_url: String,
    pub pubspec: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PubPackageDto {
    pub name: String,
    pub latest: Option<PubVersionDto>,
    pub versions: Vec<PubVersionDto>,
}

pub fn archive_url(base_url: &str, package: &str, version: &str) -> String {
    format!(
        "{}/packages/{}/versions/{}.tar.gz",
        base_url, package, version
    )
}

impl PubVersionDto {
    pub fn from_model(model: &PubVersion, base_url: &str) -> Self {
        Self {
            version: model.version.clone(),
            archive_url: archive_url(base_url, &model.package_name, &model.version),
            pubspec: model.pubspec.clone(),
        }
    }
}

impl PubPackageDto {
    /// `versions` must already be ordered newest first; `latest` is the first
    /// stable entry in that order.
    pub fn from_versions(name: &str, versions: &[PubVersion], base_url: &str) -> Self {
        let latest = versions
            .iter()
            .find(|v| !v.prerelease)
            .map(|v| PubVersionDto::from_model(v, base_url));

        Self {
            name: name.to_string(),
            latest,
            versions: versions
                .iter()
                .map(|v| PubVersionDto::from_model(v, base_url))
                .collect(),
        }
    }
}

/// Response of `GET /api/packages/versions/new`.
#[derive(Debug, Serialize)]
pub struct UploadTargetDto {
    pub url: String,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePackageRequest {
    #[validate(required(message = "Private is required"))]
    pub private: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UploadFinishQuery {
    pub error: Option<String>,
}
