pub mod pub_package;
pub mod pub_token;
pub mod pub_version;
pub mod user;
pub mod user_otp;

pub use pub_package::PubPackage;
pub use pub_token::PubToken;
pub use pub_version::{NewPubVersion, PubVersion, PubVersionSummary};
pub use user::{User, UserResponse};
pub use user_otp::{OtpPurpose, UserOtp};
