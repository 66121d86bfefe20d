pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use service_core::middleware::{
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::RegistryConfig;
use crate::services::{
    storage::LOCAL_STORAGE_ROUTE, Database, EmailProvider, JwtService, PubTokenService,
    RegistryService, Storage, UserService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RegistryConfig>,
    pub db: Database,
    pub jwt: JwtService,
    pub users: UserService,
    pub pub_tokens: PubTokenService,
    pub registry: RegistryService,
    pub storage: Arc<dyn Storage>,
    pub login_rate_limiter: IpRateLimiter,
    pub password_reset_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire services and rate limiters around an existing pool and collaborators.
    pub fn new(
        config: RegistryConfig,
        pool: PgPool,
        storage: Arc<dyn Storage>,
        email: Arc<dyn EmailProvider>,
    ) -> Self {
        let db = Database::new(pool);
        let jwt = JwtService::new(&config.jwt);

        let users = UserService::new(db.clone(), jwt.clone(), email, config.otp_expiry_minutes);
        let pub_tokens = PubTokenService::new(db.clone(), jwt.clone());
        let registry =
            RegistryService::new(db.clone(), storage.clone(), config.upstream_url.clone());

        let limits = &config.rate_limit;
        let login_rate_limiter =
            create_ip_rate_limiter(limits.login_attempts, limits.login_window_seconds);
        let password_reset_rate_limiter = create_ip_rate_limiter(
            limits.password_reset_attempts,
            limits.password_reset_window_seconds,
        );
        let ip_rate_limiter =
            create_ip_rate_limiter(limits.global_ip_limit, limits.global_ip_window_seconds);

        Self {
            config: Arc::new(config),
            db,
            jwt,
            users,
            pub_tokens,
            registry,
            storage,
            login_rate_limiter,
            password_reset_rate_limiter,
            ip_rate_limiter,
        }
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed_origins.iter().filter_map(|o| {
            o.parse::<HeaderValue>()
                .map_err(|e| tracing::error!(origin = %o, error = %e, "Invalid CORS origin"))
                .ok()
        }))
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("x-request-id"),
        ])
}

pub fn build_router(state: AppState) -> Router {
    // User session routes
    let login_route = Router::new()
        .route("/users/login", post(handlers::user::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let password_reset_routes = Router::new()
        .route(
            "/users/forgot-password/otp",
            post(handlers::user::forgot_password_otp),
        )
        .route(
            "/users/forgot-password/create-password",
            post(handlers::user::forgot_password_create),
        )
        .layer(from_fn_with_state(
            state.password_reset_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let refresh_route = Router::new()
        .route("/users/refresh", post(handlers::user::refresh))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::refresh_auth_middleware,
        ));

    let user_routes = Router::new()
        .route("/users/profile", get(handlers::user::profile))
        .route(
            "/pubtoken",
            post(handlers::pub_token::create).get(handlers::pub_token::list),
        )
        .route(
            "/pubtoken/:id",
            get(handlers::pub_token::detail)
                .put(handlers::pub_token::update)
                .delete(handlers::pub_token::delete),
        )
        .layer(from_fn_with_state(state.clone(), middleware::auth_middleware));

    let admin_routes = Router::new()
        .route(
            "/users",
            post(handlers::user::create_user).get(handlers::user::list_users),
        )
        .route(
            "/users/:id",
            get(handlers::user::get_user)
                .put(handlers::user::update_user)
                .delete(handlers::user::delete_user),
        )
        .route(
            "/query/packages/:package",
            put(handlers::query::update_package),
        )
        .layer(from_fn(middleware::admin_middleware))
        .layer(from_fn_with_state(state.clone(), middleware::auth_middleware));

    // Pub repository protocol
    let pub_read_routes = Router::new()
        .route("/api/packages/:package", get(handlers::pub_api::version_list))
        .route(
            "/api/packages/:package/versions/:version",
            get(handlers::pub_api::version_detail),
        )
        .route(
            "/packages/:package/versions/:archive",
            get(handlers::pub_api::download),
        )
        .route(
            &format!("{}/*key", LOCAL_STORAGE_ROUTE),
            get(handlers::storage::download),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::optional_pub_token_middleware,
        ));

    let pub_upload_routes = Router::new()
        .route(
            "/api/packages/versions/new",
            get(handlers::pub_api::upload_target),
        )
        .route(
            "/api/packages/versions/newUpload",
            post(handlers::pub_api::upload),
        )
        .route(
            "/api/packages/versions/newUploadFinish",
            get(handlers::pub_api::upload_finish),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::write_pub_token_middleware,
        ));

    // Management catalog
    let query_routes = Router::new()
        .route("/query/packages", get(handlers::query::list_packages))
        .route(
            "/query/packages/:package/versions",
            get(handlers::query::list_versions),
        )
        .route(
            "/query/packages/:package/versions/:version",
            get(handlers::query::version_detail),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::optional_auth_middleware,
        ));

    let body_limit = state.config.max_upload_size_mb * 1024 * 1024;
    let ip_limiter = state.ip_rate_limiter.clone();
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .merge(login_route)
        .merge(password_reset_routes)
        .merge(refresh_route)
        .merge(user_routes)
        .merge(admin_routes)
        .merge(pub_read_routes)
        .merge(pub_upload_routes)
        .merge(query_routes)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        // Global IP rate limiting
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                    user_id = tracing::field::Empty,
                    token_id = tracing::field::Empty,
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
}
