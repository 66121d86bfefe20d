//! Package archive inspection.
//!
//! An upload is a gzip-compressed tarball. Only three files matter to the
//! registry: the `pubspec.yaml` manifest, the readme and the changelog. They are
//! matched on their base name, case-insensitively, wherever they sit in the
//! archive; when several entries match the same name the last one wins.
//!
//! Decoding is bounded: each recognised file may hold at most
//! [`MAX_ENTRY_BYTES`] and the whole decompressed stream at most
//! [`MAX_UNPACKED_BYTES`], whatever the compressed upload size.

use flate2::read::GzDecoder;
use std::io::Read;
use tar::Archive;

use crate::models::NewPubVersion;
use crate::services::ServiceError;

const PUBSPEC_FILE: &str = "pubspec.yaml";
const README_FILE: &str = "readme.md";
const CHANGELOG_FILE: &str = "changelog.md";

/// Largest manifest, readme or changelog buffered from an archive.
pub const MAX_ENTRY_BYTES: u64 = 4 * 1024 * 1024;
/// Largest decompressed tar stream walked before the upload is rejected.
pub const MAX_UNPACKED_BYTES: u64 = 512 * 1024 * 1024;

/// Size caps applied while decoding an upload.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveLimits {
    pub max_entry_bytes: u64,
    pub max_unpacked_bytes: u64,
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        Self {
            max_entry_bytes: MAX_ENTRY_BYTES,
            max_unpacked_bytes: MAX_UNPACKED_BYTES,
        }
    }
}

/// Recognised files pulled out of an archive.
#[derive(Debug, Default, Clone)]
pub struct ArchiveContents {
    pub pubspec: Option<String>,
    pub readme: Option<String>,
    pub changelog: Option<String>,
}

/// Manifest fields the registry relies on, plus the manifest itself as JSON.
#[derive(Debug, Clone)]
pub struct PackageManifest {
    pub name: String,
    pub version: semver::Version,
    pub pubspec: serde_json::Value,
}

impl PackageManifest {
    pub fn version_string(&self) -> String {
        self.version.to_string()
    }
}

/// Single pass over the tarball, buffering the recognised files.
pub fn read_archive(data: &[u8], limits: ArchiveLimits) -> Result<ArchiveContents, ServiceError> {
    // Past the cap the tar reader sees a truncated stream and fails
    let unpacked = GzDecoder::new(data).take(limits.max_unpacked_bytes);
    let mut archive = Archive::new(unpacked);
    let mut contents = ArchiveContents::default();

    let entries = archive
        .entries()
        .map_err(|e| ServiceError::InvalidArchive(e.to_string()))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| ServiceError::InvalidArchive(e.to_string()))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let file_name = {
            let path = entry
                .path()
                .map_err(|e| ServiceError::InvalidArchive(e.to_string()))?;
            match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_lowercase(),
                None => continue,
            }
        };

        let slot = match file_name.as_str() {
            PUBSPEC_FILE => &mut contents.pubspec,
            README_FILE => &mut contents.readme,
            CHANGELOG_FILE => &mut contents.changelog,
            _ => continue,
        };

        if entry.header().size().unwrap_or(0) > limits.max_entry_bytes {
            return Err(entry_too_large(&file_name, limits));
        }

        let mut buf = Vec::new();
        entry
            .by_ref()
            .take(limits.max_entry_bytes + 1)
            .read_to_end(&mut buf)
            .map_err(|e| ServiceError::InvalidArchive(e.to_string()))?;
        if buf.len() as u64 > limits.max_entry_bytes {
            return Err(entry_too_large(&file_name, limits));
        }
        *slot = Some(String::from_utf8_lossy(&buf).into_owned());
    }

    Ok(contents)
}

fn entry_too_large(file_name: &str, limits: ArchiveLimits) -> ServiceError {
    ServiceError::InvalidArchive(format!(
        "{} exceeds {} bytes",
        file_name, limits.max_entry_bytes
    ))
}

/// Parse `pubspec.yaml` and pull out the name and semantic version.
pub fn parse_manifest(raw: &str) -> Result<PackageManifest, ServiceError> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(raw).map_err(|e| ServiceError::InvalidManifest(e.to_string()))?;

    let mapping = yaml
        .as_mapping()
        .ok_or_else(|| ServiceError::InvalidManifest("manifest is not a mapping".to_string()))?;

    let name = mapping
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ServiceError::InvalidManifest("`name` must be a string".to_string()))?
        .to_string();

    let version_str = mapping
        .get("version")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ServiceError::InvalidManifest("`version` must be a string".to_string()))?;

    if !is_valid_package_name(&name) {
        return Err(ServiceError::InvalidManifest(format!(
            "invalid package name `{}`",
            name
        )));
    }

    let version = semver::Version::parse(version_str.trim()).map_err(|e| {
        ServiceError::InvalidManifest(format!("invalid version `{}`: {}", version_str, e))
    })?;

    let pubspec =
        serde_json::to_value(&yaml).map_err(|e| ServiceError::InvalidManifest(e.to_string()))?;

    Ok(PackageManifest {
        name,
        version,
        pubspec,
    })
}

/// Package names are lowercase identifiers; this also keeps storage keys path-safe.
pub fn is_valid_package_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

/// Read an uploaded archive into the version row it will produce.
pub fn inspect_upload(
    data: &[u8],
    uploader_id: Option<uuid::Uuid>,
) -> Result<NewPubVersion, ServiceError> {
    inspect_upload_with(data, uploader_id, ArchiveLimits::default())
}

pub fn inspect_upload_with(
    data: &[u8],
    uploader_id: Option<uuid::Uuid>,
    limits: ArchiveLimits,
) -> Result<NewPubVersion, ServiceError> {
    let contents = read_archive(data, limits)?;
    let raw = contents.pubspec.ok_or(ServiceError::MissingManifest)?;
    let manifest = parse_manifest(&raw)?;

    Ok(NewPubVersion {
        package_name: manifest.name.clone(),
        version: manifest.version_string(),
        major: to_i64(manifest.version.major)?,
        minor: to_i64(manifest.version.minor)?,
        patch: to_i64(manifest.version.patch)?,
        prerelease: !manifest.version.pre.is_empty(),
        pubspec: manifest.pubspec,
        uploader_id,
        readme: contents.readme,
        changelog: contents.changelog,
    })
}

fn to_i64(component: u64) -> Result<i64, ServiceError> {
    i64::try_from(component)
        .map_err(|_| ServiceError::InvalidManifest("version component too large".to_string()))
}
