mod common;

use axum::http::{Method, StatusCode};
use common::{pubspec_archive, unique_email, unique_package_name, TestApp};
use serde_json::json;

fn otp_from(body: &str) -> String {
    body.split("password: ")
        .nth(1)
        .map(|rest| rest.chars().take(6).collect())
        .unwrap_or_default()
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_login_profile_and_refresh() {
    let app = TestApp::spawn().await;
    let email = unique_email();
    let admin = app.admin_token().await;
    app.create_user(&admin, &email, false).await;

    let res = app
        .json(
            Method::POST,
            "/users/login",
            None,
            json!({ "email": email, "password": "wrong" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        res.json()["response_schema"]["response_message"],
        "Email and password doesn't match."
    );

    let (access, refresh) = app.login(&email, "secret").await;

    let res = app.get("/users/profile", Some(&access)).await;
    assert_eq!(res.status, StatusCode::OK);
    let profile = &res.json()["response_output"]["detail"];
    assert_eq!(profile["email"], email.as_str());
    assert_eq!(profile["is_admin"], false);
    assert!(profile.get("password").is_none());
    assert!(profile.get("created_at").is_none());

    let res = app
        .json(Method::POST, "/users/refresh", Some(&refresh), json!({}))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.json()["response_output"]["access_token"].is_string());
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_user_management() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let email = unique_email();

    let user = app.create_user(&admin, &email, false).await;
    let id = user["user_id"].as_str().unwrap().to_string();

    // Duplicate email, case-insensitively
    let res = app
        .json(
            Method::POST,
            "/users",
            Some(&admin),
            json!({ "name": "Dup", "email": email.to_uppercase(), "password": "secret" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .json(
            Method::PUT,
            &format!("/users/{}", id),
            Some(&admin),
            json!({ "name": "Renamed", "can_write": true, "password": "ignored" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let detail = &res.json()["response_output"]["detail"];
    assert_eq!(detail["name"], "Renamed");
    assert_eq!(detail["can_write"], true);

    // Password unchanged by the update
    app.login(&email, "secret").await;

    let res = app
        .get("/users?limit=100&search=renamed", Some(&admin))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let total = res.json()["response_output"]["list"]["pagination"]["total"]
        .as_i64()
        .unwrap_or_default();
    assert!(total >= 1);

    let res = app
        .send(common::request(
            Method::DELETE,
            &format!("/users/{}", id),
            Some(&admin),
            None,
        ))
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app.get(&format!("/users/{}", id), Some(&admin)).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_forgot_password_flow() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let email = unique_email();
    app.create_user(&admin, &email, false).await;

    let res = app
        .json(
            Method::POST,
            "/users/forgot-password/otp",
            None,
            json!({ "email": unique_email() }),
        )
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app
        .json(
            Method::POST,
            "/users/forgot-password/otp",
            None,
            json!({ "email": email }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.json()["response_output"]["detail"].get("otp").is_none());

    let sent = app.email.sent();
    let mail = sent.iter().rev().find(|m| m.to == email).unwrap();
    let otp = otp_from(&mail.body);
    assert_eq!(otp.len(), 6);

    let wrong = if otp == "000000" { "111111" } else { "000000" };
    let res = app
        .json(
            Method::POST,
            "/users/forgot-password/create-password",
            None,
            json!({ "email": email, "otp": wrong, "password": "new-secret" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .json(
            Method::POST,
            "/users/forgot-password/create-password",
            None,
            json!({ "email": email, "otp": otp, "password": "new-secret" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);

    app.login(&email, "new-secret").await;

    // The OTP is consumed
    let res = app
        .json(
            Method::POST,
            "/users/forgot-password/create-password",
            None,
            json!({ "email": email, "otp": otp, "password": "again" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_pub_token_management() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let owner_email = unique_email();
    let other_email = unique_email();
    app.create_user(&admin, &owner_email, false).await;
    app.create_user(&admin, &other_email, false).await;
    let (owner, _) = app.login(&owner_email, "secret").await;
    let (other, _) = app.login(&other_email, "secret").await;

    // Write tokens need the can_write permission
    let res = app
        .json(
            Method::POST,
            "/pubtoken",
            Some(&owner),
            json!({ "remarks": "ci", "read": true, "write": true, "expired_at": "2999-01-01" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .json(
            Method::POST,
            "/pubtoken",
            Some(&owner),
            json!({ "remarks": "past", "read": true, "write": false, "expired_at": "2000-01-01" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .json(
            Method::POST,
            "/pubtoken",
            Some(&owner),
            json!({ "remarks": "laptop", "read": true, "write": false, "expired_at": "2999-01-01" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let output = res.json()["response_output"].clone();
    assert!(output["token"].is_string());
    let id = output["detail"]["id"].as_str().unwrap().to_string();

    let res = app.get("/pubtoken?limit=10&search=lap", Some(&owner)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["response_output"]["list"]["pagination"]["total"], 1);

    let res = app.get(&format!("/pubtoken/{}", id), Some(&other)).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app
        .json(
            Method::PUT,
            &format!("/pubtoken/{}", id),
            Some(&owner),
            json!({ "remarks": "desktop" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["response_output"]["detail"]["remarks"], "desktop");

    let res = app
        .send(common::request(
            Method::DELETE,
            &format!("/pubtoken/{}", id),
            Some(&owner),
            None,
        ))
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app.get(&format!("/pubtoken/{}", id), Some(&owner)).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_deleted_user_tokens_stop_working() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let email = unique_email();
    let user = app.create_user(&admin, &email, true).await;
    let (access, _) = app.login(&email, "secret").await;
    let token = app.pub_token(&access, true, true).await;

    let res = app
        .upload(&token, pubspec_archive(&unique_package_name(), "1.0.0"))
        .await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let res = app
        .send(common::request(
            Method::DELETE,
            &format!("/users/{}", user["user_id"].as_str().unwrap()),
            Some(&admin),
            None,
        ))
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app
        .upload(&token, pubspec_archive(&unique_package_name(), "1.0.0"))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}
