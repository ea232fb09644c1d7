// ═══════════════════════════════════════════════════════════════
// RepForge — Gatekeeper Integration Tests
// Route policy · Token transport · Session cookie lifecycle
// ═══════════════════════════════════════════════════════════════
//
// These drive the real router through tower's `oneshot` with a lazily
// constructed pool: nothing here needs a live database, so assertions on
// DB-backed routes only check that requests clear (or fail) the gate.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use repforge_gateway::{build_router, config::Config, token, AppState};

fn test_state() -> Arc<AppState> {
    let config = Config::from_env();
    let pool = PgPoolOptions::new()
        .connect_lazy(&config.database_url)
        .expect("lazy pool construction needs no live database");
    Arc::new(AppState::new(pool, config))
}

fn issue_token(state: &AppState, roles: &[&str]) -> String {
    let roles: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
    token::issue("smoke@test.dev", &roles, &state.config.jwt_secret).unwrap()
}

#[tokio::test]
async fn readyz_is_public() {
    let app = build_router(test_state());
    let resp = app
        .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_reject_anonymous_requests() {
    let app = build_router(test_state());
    for uri in ["/api/transformation", "/api/profile", "/auth/me"] {
        let resp = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            resp.status(),
            StatusCode::UNAUTHORIZED,
            "{} must require a session token",
            uri
        );
    }
}

#[tokio::test]
async fn garbage_bearer_token_is_rejected() {
    let app = build_router(test_state());
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/transformation")
                .header(header::AUTHORIZATION, "Bearer not-a-real-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_reject_plain_users() {
    let state = test_state();
    let bearer = format!("Bearer {}", issue_token(&state, &["ROLE_USER"]));
    let app = build_router(state);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/workouts")
                .header(header::AUTHORIZATION, bearer)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_token_clears_the_gate() {
    let state = test_state();
    let bearer = format!(
        "Bearer {}",
        issue_token(&state, &["ROLE_USER", "ROLE_ADMIN"])
    );
    let app = build_router(state);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/workouts")
                .header(header::AUTHORIZATION, bearer)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    // Past the gate the handler talks to the database; only the policy
    // outcome is asserted here.
    assert_ne!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_ne!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn session_cookie_transport_is_accepted() {
    let state = test_state();
    let cookie = format!("jwt={}", issue_token(&state, &["ROLE_USER"]));
    let app = build_router(state);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/transformation")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_ne!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_ne!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn logout_clears_the_session_cookie() {
    let app = build_router(test_state());
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let set_cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("logout must set a clearing cookie");
    assert!(set_cookie.starts_with("jwt=;"));
    assert!(set_cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn login_requires_a_json_body() {
    let app = build_router(test_state());
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/login")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(resp.status().is_client_error());
}

#[tokio::test]
async fn verify_email_without_token_is_a_client_error() {
    let app = build_router(test_state());
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/auth/verify-email")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    // Missing required query parameter never reaches the handler body.
    assert!(resp.status().is_client_error());
}
