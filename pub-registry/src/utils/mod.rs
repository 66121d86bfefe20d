mod password;
mod validation;

pub use password::{generate_otp, hash_secret, secret_matches, Secret};
pub use validation::{ValidatedJson, ValidatedQuery};
