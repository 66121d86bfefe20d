pub mod auth;
pub mod pub_token;

pub use auth::{
    admin_middleware, auth_middleware, optional_auth_middleware, refresh_auth_middleware,
    AuthUser, MaybeAuthUser,
};
pub use pub_token::{
    optional_pub_token_middleware, write_pub_token_middleware, PubAccess, PubTokenAuth,
};
