use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::{token, AppState};

pub const AUTH_COOKIE: &str = "jwt";

pub const ROLE_USER: &str = "ROLE_USER";
pub const ROLE_ADMIN: &str = "ROLE_ADMIN";

/// The caller's established identity for the lifetime of one request.
/// Attached as a request extension by the gatekeeper; handlers receive it
/// explicitly instead of consulting any global security context.
#[derive(Debug, Clone)]
pub struct Principal {
    pub email: String,
    pub roles: Vec<String>,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == ROLE_ADMIN)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Admin,
}

/// Declarative route-to-policy table. Routes not listed as public require an
/// authenticated principal; the workout catalog additionally requires admin.
pub fn route_policy(path: &str) -> Access {
    const PUBLIC_EXACT: &[&str] = &[
        "/readyz",
        "/api/register",
        "/auth/login",
        "/auth/logout",
        "/auth/verify-email",
    ];

    if PUBLIC_EXACT.contains(&path)
        || path.starts_with("/oauth/google/")
        || path.starts_with("/api/public/")
    {
        return Access::Public;
    }

    if path == "/api/workouts" || path.starts_with("/api/workouts/") {
        return Access::Admin;
    }

    Access::Authenticated
}

pub(crate) fn get_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie_header = headers.get("cookie")?.to_str().ok()?;
    for pair in cookie_header.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        let key = parts.next()?.trim();
        let value = parts.next()?.trim();
        if key == name {
            return Some(value.to_string());
        }
    }
    None
}

/// Session token transport: the `jwt` cookie first, then a bearer header.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = get_cookie_value(headers, AUTH_COOKIE) {
        return Some(token);
    }
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|t| t.to_string())
}

pub fn build_cookie(name: &str, value: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; Max-Age={}; SameSite=Lax; HttpOnly",
        name, value, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_cookie(name: &str, secure: bool) -> String {
    build_cookie(name, "", 0, secure)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": "Unauthorized: invalid or missing token" })),
    )
        .into_response()
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(serde_json::json!({ "error": "Access denied" })),
    )
        .into_response()
}

/// Single-pass request gatekeeper. Establishes a `Principal` from the session
/// token when one is present and valid, then enforces the route policy.
/// Anonymous requests still flow through public routes.
pub async fn gatekeeper(State(state): State<Arc<AppState>>, mut req: Request, next: Next) -> Response {
    let policy = route_policy(req.uri().path());

    let principal = extract_token(req.headers())
        .and_then(|t| token::verify(&t, &state.config.jwt_secret))
        .map(|claims| Principal {
            email: claims.sub,
            roles: claims.roles,
        });

    if let Some(p) = &principal {
        tracing::debug!("authenticated principal {} for {}", p.email, req.uri().path());
        req.extensions_mut().insert(p.clone());
    }

    match policy {
        Access::Public => next.run(req).await,
        Access::Authenticated => {
            if principal.is_some() {
                next.run(req).await
            } else {
                unauthorized()
            }
        }
        Access::Admin => match principal {
            None => unauthorized(),
            Some(p) if !p.is_admin() => forbidden(),
            Some(_) => next.run(req).await,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn policy_marks_public_routes() {
        assert_eq!(route_policy("/readyz"), Access::Public);
        assert_eq!(route_policy("/api/register"), Access::Public);
        assert_eq!(route_policy("/auth/login"), Access::Public);
        assert_eq!(route_policy("/auth/verify-email"), Access::Public);
        assert_eq!(route_policy("/oauth/google/callback"), Access::Public);
        assert_eq!(route_policy("/api/public/profile/zenith"), Access::Public);
    }

    #[test]
    fn policy_requires_auth_by_default() {
        assert_eq!(route_policy("/auth/me"), Access::Authenticated);
        assert_eq!(route_policy("/api/profile"), Access::Authenticated);
        assert_eq!(route_policy("/api/transformation"), Access::Authenticated);
        assert_eq!(
            route_policy("/api/transformation/upload-url"),
            Access::Authenticated
        );
    }

    #[test]
    fn policy_reserves_catalog_for_admins() {
        assert_eq!(route_policy("/api/workouts"), Access::Admin);
        assert_eq!(route_policy("/api/workouts/Chest"), Access::Admin);
        assert_eq!(
            route_policy("/api/workouts/Chest/exercises/Bench%20Press"),
            Access::Admin
        );
    }

    #[test]
    fn cookie_wins_over_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "cookie",
            HeaderValue::from_static("theme=dark; jwt=cookie-token"),
        );
        headers.insert(
            "Authorization",
            HeaderValue::from_static("Bearer header-token"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("cookie-token"));
    }

    #[test]
    fn bearer_header_is_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Authorization",
            HeaderValue::from_static("Bearer header-token"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("header-token"));
    }

    #[test]
    fn missing_token_yields_none() {
        let headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);
    }

    #[test]
    fn session_cookie_is_http_only_and_lax() {
        let cookie = build_cookie(AUTH_COOKIE, "abc", 86400, false);
        assert!(cookie.contains("jwt=abc"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=86400"));
        assert!(!cookie.contains("Secure"));

        let secure = build_cookie(AUTH_COOKIE, "abc", 86400, true);
        assert!(secure.contains("Secure"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let cookie = clear_cookie(AUTH_COOKIE, false);
        assert!(cookie.starts_with("jwt=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[test]
    fn admin_check_reads_role_list() {
        let admin = Principal {
            email: "a@x.com".to_string(),
            roles: vec![ROLE_USER.to_string(), ROLE_ADMIN.to_string()],
        };
        let plain = Principal {
            email: "b@x.com".to_string(),
            roles: vec![ROLE_USER.to_string()],
        };
        assert!(admin.is_admin());
        assert!(!plain.is_admin());
    }
}
