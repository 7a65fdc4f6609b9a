// src/utils/csrf.rs

use axum::{
    body::Body,
    http::{HeaderMap, Method, Request},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::error::AppError;

pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Generates a fresh double-submit token.
pub fn generate_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// The CSRF cookie stays readable from scripts so the client can echo it back.
pub fn csrf_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((CSRF_COOKIE, token))
        .http_only(false)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

/// The cookie and header values must both be present, non-empty and identical.
pub fn tokens_match(headers: &HeaderMap) -> bool {
    let jar = CookieJar::from_headers(headers);
    let cookie = jar.get(CSRF_COOKIE).map(|c| c.value());
    let header = headers
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim);

    match (cookie, header) {
        (Some(c), Some(h)) => !c.is_empty() && c == h,
        _ => false,
    }
}

/// Axum Middleware: rejects state-changing requests without a matching CSRF pair.
///
/// Runs before authentication so that no handler logic is reached.
pub async fn csrf_middleware(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let is_write = matches!(
        *req.method(),
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    );

    if is_write && !tokens_match(req.headers()) {
        tracing::warn!("CSRF check failed for {} {}", req.method(), req.uri().path());
        return Err(AppError::Forbidden("Invalid CSRF token".to_string()));
    }

    Ok(next.run(req).await)
}
