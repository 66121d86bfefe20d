use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Email and password doesn't match.")]
    InvalidCredentials,

    #[error("Email already registered")]
    EmailAlreadyRegistered,

    #[error("User not found")]
    UserNotFound,

    #[error("Pub token not found")]
    PubTokenNotFound,

    #[error("Package not found")]
    PackageNotFound,

    #[error("Version not found")]
    VersionNotFound,

    #[error("Forbidden")]
    Forbidden,

    #[error("Invalid or expired OTP")]
    InvalidOtp,

    #[error("Archive does not contain a pubspec.yaml")]
    MissingManifest,

    #[error("Invalid pubspec.yaml: {0}")]
    InvalidManifest(String),

    #[error("Invalid package archive: {0}")]
    InvalidArchive(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Invalid token: {0}")]
    Token(String),

    #[error("Email error: {0}")]
    Email(String),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ServiceError::PackageNotFound
                | ServiceError::VersionNotFound
                | ServiceError::UserNotFound
                | ServiceError::PubTokenNotFound
        )
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::anyhow!(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::Storage(e) => {
                AppError::InternalError(anyhow::anyhow!("Storage error: {}", e))
            }
            ServiceError::Email(e) => AppError::EmailError(e),
            ServiceError::Token(e) => AppError::Unauthorized(anyhow::anyhow!(e)),
            ServiceError::Forbidden => AppError::Forbidden(anyhow::anyhow!("Forbidden")),
            e @ (ServiceError::UserNotFound
            | ServiceError::PubTokenNotFound
            | ServiceError::PackageNotFound
            | ServiceError::VersionNotFound) => AppError::NotFound(anyhow::anyhow!(e.to_string())),
            e @ (ServiceError::InvalidCredentials
            | ServiceError::EmailAlreadyRegistered
            | ServiceError::InvalidOtp
            | ServiceError::MissingManifest
            | ServiceError::InvalidManifest(_)
            | ServiceError::InvalidArchive(_)
            | ServiceError::InvalidRequest(_)) => {
                AppError::BadRequest(anyhow::anyhow!(e.to_string()))
            }
        }
    }
}
