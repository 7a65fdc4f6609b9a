// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{NaiveDate, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{config::Config, error::AppError};

pub const SESSION_COOKIE: &str = "session";

pub const ROLE_TEACHER: &str = "teacher";
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_STUDENT: &str = "student";

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - the teacher or student id.
    pub sub: String,
    /// 'teacher', 'admin' or 'student'.
    pub role: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

impl Claims {
    /// Admins are teachers with extra rights.
    pub fn is_teacher(&self) -> bool {
        self.role == ROLE_TEACHER || self.role == ROLE_ADMIN
    }

    pub fn is_student(&self) -> bool {
        self.role == ROLE_STUDENT
    }
}

/// Signs a new session token.
pub fn sign_jwt(
    id: &str,
    role: &str,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: id.to_owned(),
        role: role.to_owned(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a JWT string.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

/// A teacher's subscription lapses the day after its end date. Admins never lapse.
pub fn subscription_lapsed(role: &str, end: Option<NaiveDate>, today: NaiveDate) -> bool {
    role != ROLE_ADMIN && end.is_some_and(|end| end < today)
}

/// HttpOnly cookie carrying the signed session token.
pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

/// Finds the session token: `Authorization: Bearer` first, then the session cookie.
fn session_token(req: &Request<Body>) -> Option<String> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string);

    bearer.or_else(|| {
        CookieJar::from_headers(req.headers())
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
    })
}

/// Axum Middleware: Authentication.
///
/// Resolves the session token and injects `Claims` into the request extensions.
/// Missing or invalid sessions get 401.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_token(&req)
        .ok_or_else(|| AppError::AuthError("Authentication required".to_string()))?;

    let claims = verify_jwt(&token, &config.jwt_secret)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

fn claims_of(req: &Request<Body>) -> Result<&Claims, AppError> {
    req.extensions()
        .get::<Claims>()
        .ok_or_else(|| AppError::AuthError("Authentication required".to_string()))
}

/// Must be used AFTER `auth_middleware`. Teachers and admins only.
///
/// The subscription is re-read on every request so a token issued before
/// the end date stops working once it passes.
pub async fn teacher_middleware(
    State(pool): State<SqlitePool>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let claims = claims_of(&req)?;
    if !claims.is_teacher() {
        return Err(AppError::Forbidden("Teacher access required".to_string()));
    }

    if claims.role != ROLE_ADMIN {
        let end: Option<NaiveDate> =
            sqlx::query_scalar("SELECT subscription_end_date FROM users WHERE id = ?")
                .bind(&claims.sub)
                .fetch_optional(&pool)
                .await?
                .ok_or_else(|| AppError::AuthError("Account no longer exists".to_string()))?;

        if subscription_lapsed(&claims.role, end, Utc::now().date_naive()) {
            tracing::warn!("Rejected teacher {} with a lapsed subscription", claims.sub);
            return Err(AppError::Forbidden("Subscription has expired".to_string()));
        }
    }

    Ok(next.run(req).await)
}

/// Must be used AFTER `auth_middleware`. Admins only.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    if claims_of(&req)?.role != ROLE_ADMIN {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }
    Ok(next.run(req).await)
}

/// Must be used AFTER `auth_middleware`. Students only.
pub async fn student_middleware(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    if !claims_of(&req)?.is_student() {
        return Err(AppError::Forbidden("Student access required".to_string()));
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify() {
        let token = sign_jwt("t-1", ROLE_TEACHER, "secret", 60).unwrap();
        let claims = verify_jwt(&token, "secret").unwrap();
        assert_eq!(claims.sub, "t-1");
        assert!(claims.is_teacher());
        assert!(!claims.is_student());
    }

    #[test]
    fn session_cookie_wins_only_without_bearer() {
        let req = Request::get("/")
            .header(header::COOKIE, "csrf_token=x; session=from-cookie")
            .body(Body::empty())
            .unwrap();
        assert_eq!(session_token(&req).as_deref(), Some("from-cookie"));

        let req = Request::get("/")
            .header(header::AUTHORIZATION, "Bearer from-header")
            .header(header::COOKIE, "session=from-cookie")
            .body(Body::empty())
            .unwrap();
        assert_eq!(session_token(&req).as_deref(), Some("from-header"));

        let cookie = session_cookie("tok".to_string(), false);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    }

    #[test]
    fn subscriptions_lapse_after_their_end_date() {
        let today = NaiveDate::from_ymd_opt(2025, 9, 10).unwrap();
        let yesterday = NaiveDate::from_ymd_opt(2025, 9, 9).unwrap();

        assert!(subscription_lapsed(ROLE_TEACHER, Some(yesterday), today));
        assert!(!subscription_lapsed(ROLE_TEACHER, Some(today), today));
        assert!(!subscription_lapsed(ROLE_TEACHER, None, today));
        assert!(!subscription_lapsed(ROLE_ADMIN, Some(yesterday), today));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = sign_jwt("s-1", ROLE_STUDENT, "secret", 60).unwrap();
        assert!(matches!(
            verify_jwt(&token, "other"),
            Err(AppError::AuthError(_))
        ));
    }
}
