//! Services layer for pub-registry.
//!
//! Business logic for users, pub tokens and the package registry, plus the
//! database, storage, JWT and email collaborators they share.

pub mod archive;
pub mod database;
mod email;
pub mod error;
mod jwt;
mod pub_token;
pub mod registry;
pub mod storage;
mod user;

pub use database::Database;
pub use email::{EmailProvider, EmailService, MockEmailService, SentEmail};
pub use error::ServiceError;
pub use jwt::{Claims, JwtService, TokenResponse};
pub use pub_token::PubTokenService;
pub use registry::{RegistryService, Visibility};
pub use storage::{LocalStorage, S3Storage, Storage};
pub use user::{UserService, SEED_ADMIN_EMAIL, SEED_ADMIN_ID, SEED_ADMIN_PASSWORD};
