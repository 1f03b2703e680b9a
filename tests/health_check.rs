//! Smoke tests that need no database: the pool is lazy and these routes
//! never touch it.

use std::net::TcpListener;
use account_service::configuration::get_configuration;
use account_service::startup::run;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let configuration = get_configuration().expect("Failed to read configuration.");
    let pool = PgPoolOptions::new()
        .connect_lazy(&configuration.database.connection_string())
        .expect("Failed to create lazy pool");

    let server = run(listener, pool, configuration)
        .expect("Failed to create server");
    let _ = tokio::spawn(server);

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert!(response.headers().get("x-request-id").is_some());
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn protected_routes_return_401_without_token() {
    let addr = spawn_app();
    let client = reqwest::Client::new();

    let routes = vec![
        ("POST", "/api/v1/users/logout"),
        ("POST", "/api/v1/users/change-password"),
        ("GET", "/api/v1/users/current-user"),
        ("PATCH", "/api/v1/users/update-account"),
        ("PATCH", "/api/v1/users/avatar"),
        ("PATCH", "/api/v1/users/cover-image"),
    ];

    for (method, path) in routes {
        let method = reqwest::Method::from_bytes(method.as_bytes()).unwrap();
        let response = client
            .request(method, &format!("{}{}", addr, path))
            .send()
            .await
            .expect("Failed to execute request");

        assert_eq!(401, response.status().as_u16(), "{} should require auth", path);
        let body: Value = response.json().await.expect("Failed to parse response");
        assert_eq!(body["code"], "UNAUTHORIZED");
    }
}

#[tokio::test]
async fn protected_route_returns_401_with_invalid_token() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/api/v1/users/current-user", addr))
        .header("Authorization", "Bearer invalid.token.here")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["code"], "TOKEN_INVALID");
}

#[tokio::test]
async fn invalid_access_token_cookie_is_rejected() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/api/v1/users/current-user", addr))
        .header("Cookie", "accessToken=not-a-jwt")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn refresh_without_token_returns_401() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .post(&format!("{}/api/v1/users/refresh-token", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["code"], "MISSING_TOKEN");
}

#[tokio::test]
async fn refresh_with_garbage_token_returns_401() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .post(&format!("{}/api/v1/users/refresh-token", addr))
        .json(&serde_json::json!({ "refresh_token": "garbage" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["code"], "TOKEN_INVALID");
}

#[tokio::test]
async fn login_returns_400_for_malformed_body() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .post(&format!("{}/api/v1/users/login", addr))
        .json(&serde_json::json!({ "email": "john@example.com" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(400, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn register_returns_400_for_missing_fields() {
    let addr = spawn_app();

    let form = reqwest::multipart::Form::new()
        .text("email", "john@example.com")
        .text("username", "johndoe")
        .text("password", "SecurePass123");

    let response = reqwest::Client::new()
        .post(&format!("{}/api/v1/users/register", addr))
        .multipart(form)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(400, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["message"], "fullname is empty");
}

#[tokio::test]
async fn middleware_rejection_carries_request_id_and_security_headers() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/api/v1/users/current-user", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(401, response.status().as_u16());
    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("missing x-request-id")
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error_id"], request_id.as_str());
}

#[tokio::test]
async fn error_id_matches_request_id_header() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .post(&format!("{}/api/v1/users/refresh-token", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(401, response.status().as_u16());
    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("missing x-request-id")
        .to_str()
        .unwrap()
        .to_string();

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error_id"], request_id.as_str());
}
