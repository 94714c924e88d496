// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, Response};
use std::sync::Arc;
use tower::ServiceExt;
use userbase::config::Config;
use userbase::db::{FirestoreDb, UserDb};
use userbase::routes::create_router;
use userbase::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Connect to the Firestore emulator.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Build shared state over an in-memory store.
#[allow(dead_code)]
pub fn test_state(config: Config) -> Arc<AppState> {
    Arc::new(AppState::new(config, UserDb::in_memory()).expect("test secrets are non-empty"))
}

/// Create a test app with offline in-memory dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let state = test_state(Config::test_default());
    (create_router(state.clone()), state)
}

/// A JSON request with the given method, URI and body.
#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).expect("response body is JSON")
}

/// The `Set-Cookie` header for `name`, if any.
#[allow(dead_code)]
pub fn set_cookie<B>(response: &Response<B>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{name}=")))
        .map(str::to_string)
}

/// Value of a `Set-Cookie` header line (`name=value; ...` -> `value`).
#[allow(dead_code)]
pub fn cookie_value(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value.to_string())
        .unwrap_or_default()
}

/// Register a user through the API and return the response JSON and the
/// refresh cookie value.
#[allow(dead_code)]
pub async fn sign_up(app: &axum::Router, username: &str) -> (serde_json::Value, String) {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/user/sign_up",
            serde_json::json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "correct horse battery staple",
                "firstname": "Test",
                "lastname": "User",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    let cookie = set_cookie(&response, "refreshToken").expect("refresh cookie set");
    (body_json(response).await, cookie_value(&cookie))
}
