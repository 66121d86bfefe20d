mod common;

use axum::http::{Method, StatusCode};
use common::{multipart_request, oversized_readme_archive, TestApp, TEST_JWT_SECRET};
use pub_registry::{
    config::JwtConfig,
    handlers::pub_api::PUB_CONTENT_TYPE,
    services::{archive::MAX_ENTRY_BYTES, JwtService, ServiceError, Storage},
};
use serde_json::json;
use uuid::Uuid;

fn jwt() -> JwtService {
    JwtService::new(&JwtConfig {
        secret: TEST_JWT_SECRET.to_string(),
        token_lifetime_minutes: 60,
        refresh_lifetime_minutes: 1440,
    })
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let app = TestApp::lazy().await;

    let res = app.get("/users/profile", None).await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    let body = res.json();
    assert_eq!(body["response_schema"]["response_code"], "APP-401");
    assert_eq!(body["response_schema"]["response_message"], "Unauthenticated");
    assert_eq!(body["response_output"]["errors"], json!([]));
}

#[tokio::test]
async fn test_invalid_token_is_unauthenticated() {
    let app = TestApp::lazy().await;

    let res = app.get("/pubtoken?limit=10", Some("not-a-jwt")).await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.json()["response_schema"]["response_message"], "Unauthenticated");
}

#[tokio::test]
async fn test_admin_routes_reject_non_admin() {
    let app = TestApp::lazy().await;
    let tokens = jwt().generate_token_pair(Uuid::new_v4(), false).unwrap();

    let res = app.get("/users?limit=10", Some(&tokens.access_token)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app
        .json(
            Method::PUT,
            "/query/packages/foo",
            Some(&tokens.access_token),
            json!({ "private": false }),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_requires_refresh_token() {
    let app = TestApp::lazy().await;
    let tokens = jwt().generate_token_pair(Uuid::new_v4(), false).unwrap();

    let res = app
        .json(Method::POST, "/users/refresh", Some(&tokens.access_token), json!({}))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_access_token_rejected_on_refresh_only_paths_and_vice_versa() {
    let app = TestApp::lazy().await;
    let tokens = jwt().generate_token_pair(Uuid::new_v4(), true).unwrap();

    let res = app.get("/users/profile", Some(&tokens.refresh_token)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_validation_error() {
    let app = TestApp::lazy().await;

    let res = app
        .json(
            Method::POST,
            "/users/login",
            None,
            json!({ "email": "not-an-email", "password": "secret" }),
        )
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let body = res.json();
    assert_eq!(body["response_schema"]["response_message"], "Validation Error");
    assert_eq!(body["response_output"]["errors"][0]["field"], "email");
}

#[tokio::test]
async fn test_list_requires_limit() {
    let app = TestApp::lazy().await;
    let tokens = jwt().generate_token_pair(Uuid::new_v4(), true).unwrap();

    let res = app.get("/users", Some(&tokens.access_token)).await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["response_output"]["errors"][0]["field"], "limit");

    let res = app.get("/users?limit=101", Some(&tokens.access_token)).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_rejects_page_beyond_bound() {
    let app = TestApp::lazy().await;

    let res = app
        .get("/query/packages?limit=100&page=9223372036854775807", None)
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["response_output"]["errors"][0]["field"], "page");

    let tokens = jwt().generate_token_pair(Uuid::new_v4(), true).unwrap();
    let res = app
        .get("/users?limit=1&page=1000001", Some(&tokens.access_token))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["response_output"]["errors"][0]["field"], "page");
}

#[tokio::test]
async fn test_create_pub_token_validation() {
    let app = TestApp::lazy().await;
    let tokens = jwt().generate_token_pair(Uuid::new_v4(), false).unwrap();

    let res = app
        .json(
            Method::POST,
            "/pubtoken",
            Some(&tokens.access_token),
            json!({ "remarks": "ci", "write": true, "expired_at": "31-12-2999" }),
        )
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let fields: Vec<String> = res.json()["response_output"]["errors"]
        .as_array()
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e["field"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    assert!(fields.contains(&"read".to_string()));
    assert!(fields.contains(&"expired_at".to_string()));
}

#[tokio::test]
async fn test_forgot_password_validation() {
    let app = TestApp::lazy().await;

    let res = app
        .json(
            Method::POST,
            "/users/forgot-password/create-password",
            None,
            json!({ "email": "a@example.com", "otp": "123", "password": "secret" }),
        )
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["response_output"]["errors"][0]["field"], "otp");
}

#[tokio::test]
async fn test_upload_routes_require_write_token() {
    let app = TestApp::lazy().await;

    let res = app.get("/api/packages/versions/new", None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.header("content-type"), Some(PUB_CONTENT_TYPE));
    assert_eq!(
        res.json(),
        json!({ "error": { "code": "401", "message": "Unauthenticated" } })
    );

    // A user session token is not a pub token
    let tokens = jwt().generate_token_pair(Uuid::new_v4(), true).unwrap();
    let res = app
        .send(multipart_request(
            "/api/packages/versions/newUpload",
            &tokens.access_token,
            "file",
            vec![1, 2, 3],
        ))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.json()["error"]["code"], "401");
}

#[tokio::test]
async fn test_pub_read_routes_ignore_unusable_token() {
    let app = TestApp::lazy().await;

    // The token is dropped as anonymous; the lookup then reaches the unavailable database
    for uri in ["/api/packages/foo", "/api/packages/foo/versions/1.0.0"] {
        let res = app.get(uri, Some("not-a-jwt")).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(res.header("content-type"), Some(PUB_CONTENT_TYPE));
        assert_eq!(
            res.json(),
            json!({ "error": { "code": "400", "message": "Database error" } })
        );
    }
}

#[tokio::test]
async fn test_upload_rejects_oversized_entry_before_storage() {
    let app = TestApp::lazy().await;
    let data = oversized_readme_archive("bomb", "1.0.0", MAX_ENTRY_BYTES * 2);
    assert!((data.len() as u64) < MAX_ENTRY_BYTES / 16);

    // Rejected while decoding, so neither the database nor storage is reached
    let err = app.state.registry.upload_version(data, None).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidArchive(_)), "{:?}", err);
    assert!(app
        .state
        .storage
        .download("packages/bomb/versions/1.0.0.tar.gz")
        .await
        .is_err());
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let app = TestApp::lazy().await;

    let res = app.get("/users/profile", None).await;

    assert!(res.header("x-request-id").is_some());
    assert_eq!(res.header("x-content-type-options"), Some("nosniff"));
}

#[tokio::test]
async fn test_health_reports_unavailable_database() {
    let app = TestApp::lazy().await;

    let res = app.get("/health", None).await;

    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    let body = res.json();
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["checks"]["postgresql"], "down");
}

#[tokio::test]
async fn test_login_rate_limited_per_ip() {
    let app = TestApp::lazy_with(&[("RATE_LIMIT_LOGIN_ATTEMPTS", "1")]).await;

    let login = || {
        let mut req = common::request(
            Method::POST,
            "/users/login",
            None,
            Some(json!({ "email": "bad", "password": "x" })),
        );
        req.headers_mut()
            .insert("x-forwarded-for", "203.0.113.7".parse().unwrap());
        req
    };

    let first = app.send(login()).await;
    assert_eq!(first.status, StatusCode::BAD_REQUEST);

    let second = app.send(login()).await;
    assert_eq!(second.status, StatusCode::TOO_MANY_REQUESTS);
    assert!(second.header("retry-after").is_some());
}
