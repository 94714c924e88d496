// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Router-level tests: health, fallback, CORS, security headers and rate limiting.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, StatusCode},
};
use std::net::SocketAddr;
use tower::ServiceExt;
use userbase::config::Config;
use userbase::routes::create_router;

mod common;

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = common::create_test_app();

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_unknown_route_uses_envelope() {
    let (app, _) = common::create_test_app();

    let response = app.oneshot(get("/no/such/route")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = common::body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Not Found");
}

#[tokio::test]
async fn test_security_headers_on_api_responses() {
    let (app, _) = common::create_test_app();

    let response = app.oneshot(get("/health")).await.unwrap();

    let headers = response.headers();
    assert_eq!(headers.get("X-Content-Type-Options").unwrap(), "nosniff");
    assert_eq!(headers.get("X-Frame-Options").unwrap(), "DENY");
}

#[tokio::test]
async fn test_cors_preflight_allows_frontend_with_credentials() {
    let (app, state) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/user/log_in")
                .header(header::ORIGIN, &state.config.frontend_url)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        state.config.frontend_url.as_str()
    );
    assert_eq!(
        headers
            .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .unwrap(),
        "true"
    );
}

#[tokio::test]
async fn test_cors_ignores_other_origins() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(header::ORIGIN, "https://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

fn limited_app(limit: u32, trusted_proxy_header: Option<&str>) -> axum::Router {
    let config = Config {
        auth_rate_limit: limit,
        trusted_proxy_header: trusted_proxy_header.map(str::to_string),
        ..Config::test_default()
    };
    create_router(common::test_state(config))
}

fn lookup_from(peer: &str, forwarded_for: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri("/user/user_info?username=nobody");
    if let Some(ip) = forwarded_for {
        builder = builder.header("x-forwarded-for", ip);
    }
    let mut request = builder.body(Body::empty()).unwrap();
    let peer: SocketAddr = peer.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));
    request
}

#[tokio::test]
async fn test_account_routes_are_rate_limited_per_ip() {
    let app = limited_app(2, None);

    for remaining in ["1", "0"] {
        let response = app
            .clone()
            .oneshot(lookup_from("198.51.100.1:5000", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["ratelimit-limit"], "2");
        assert_eq!(response.headers()["ratelimit-remaining"], remaining);
    }

    let limited = app
        .clone()
        .oneshot(lookup_from("198.51.100.1:5001", None))
        .await
        .unwrap();
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.headers()["ratelimit-remaining"], "0");
    assert!(limited.headers().get(header::RETRY_AFTER).is_some());
    let body = common::body_json(limited).await;
    assert_eq!(body["success"], false);

    // Another client and non-account routes are unaffected
    let other = app
        .clone()
        .oneshot(lookup_from("198.51.100.2:5000", None))
        .await
        .unwrap();
    assert_eq!(other.status(), StatusCode::NOT_FOUND);
    let health = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    assert!(health.headers().get("ratelimit-limit").is_none());
}

#[tokio::test]
async fn test_rotating_forwarded_for_does_not_evade_limit() {
    let app = limited_app(3, None);

    let mut statuses = Vec::new();
    for i in 0..20 {
        let mut request = common::json_request(
            "POST",
            "/user/log_in",
            serde_json::json!({"username": "ada", "password": "guess"}),
        );
        request
            .headers_mut()
            .insert("x-forwarded-for", format!("203.0.113.{i}").parse().unwrap());
        request
            .extensions_mut()
            .insert(ConnectInfo("192.0.2.50:6000".parse::<SocketAddr>().unwrap()));
        statuses.push(app.clone().oneshot(request).await.unwrap().status());
    }

    assert!(statuses[..3].iter().all(|s| *s == StatusCode::UNAUTHORIZED));
    assert!(statuses[3..]
        .iter()
        .all(|s| *s == StatusCode::TOO_MANY_REQUESTS));
}

#[tokio::test]
async fn test_trusted_proxy_header_keys_clients() {
    let app = limited_app(1, Some("x-forwarded-for"));

    // Same proxy peer, different forwarded clients
    let first = app
        .clone()
        .oneshot(lookup_from("10.0.0.1:443", Some("203.0.113.1")))
        .await
        .unwrap();
    let second = app
        .clone()
        .oneshot(lookup_from("10.0.0.1:443", Some("203.0.113.2, 10.0.0.1")))
        .await
        .unwrap();
    let repeat = app
        .oneshot(lookup_from("10.0.0.1:443", Some("203.0.113.1")))
        .await
        .unwrap();

    assert_eq!(first.status(), StatusCode::NOT_FOUND);
    assert_eq!(second.status(), StatusCode::NOT_FOUND);
    assert_eq!(repeat.status(), StatusCode::TOO_MANY_REQUESTS);
}
