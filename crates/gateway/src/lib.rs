use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod google;
pub mod handlers;
pub mod mail;
pub mod models;
pub mod security;
pub mod storage;
pub mod token;
pub mod verification;

pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: config::Config,
    pub storage: storage::StorageClient,
    pub mailer: mail::Mailer,
    pub google: google::GoogleOAuth,
}

impl AppState {
    pub fn new(db: sqlx::PgPool, config: config::Config) -> Self {
        let http = reqwest::Client::new();
        Self {
            storage: storage::StorageClient::new(http.clone(), &config.storage),
            mailer: mail::Mailer::new(http.clone(), &config.mail),
            google: google::GoogleOAuth::new(http, &config.google),
            db,
            config,
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    // Credentialed CORS: the session cookie only flows to the configured
    // front-end origin.
    let origin = state
        .config
        .frontend_url
        .parse::<HeaderValue>()
        .unwrap_or_else(|_| HeaderValue::from_static("http://localhost:3000"));
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/readyz", get(health_check))
        .route("/api/register", post(handlers::auth::register))
        .route("/auth/verify-email", get(handlers::auth::verify_email))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/me", get(handlers::auth::me))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/oauth/google/callback", get(handlers::oauth::google_callback))
        .route(
            "/api/profile",
            get(handlers::profile::get_profile).put(handlers::profile::update_profile),
        )
        .route(
            "/api/public/profile/:username",
            get(handlers::profile::public_profile),
        )
        .route(
            "/api/upload-profile-picture",
            post(handlers::profile::upload_profile_picture),
        )
        .route(
            "/api/workouts",
            get(handlers::workouts::list_groups).post(handlers::workouts::create_group),
        )
        .route(
            "/api/workouts/:name",
            put(handlers::workouts::rename_group).delete(handlers::workouts::delete_group),
        )
        .route(
            "/api/workouts/:name/exercises",
            post(handlers::workouts::add_exercise),
        )
        .route(
            "/api/workouts/:name/exercises/:exercise",
            axum::routing::delete(handlers::workouts::remove_exercise),
        )
        .route(
            "/api/transformation/upload-url",
            post(handlers::transformations::upload_url),
        )
        .route(
            "/api/transformation",
            post(handlers::transformations::save).get(handlers::transformations::list),
        )
        .route(
            "/api/transformation/image-url",
            get(handlers::transformations::image_url),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            security::gatekeeper,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "repforge-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
