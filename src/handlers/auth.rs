// src/handlers/auth.rs

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::Utc;
use serde_json::{Value, json};
use sqlx::SqlitePool;

use crate::{
    config::Config,
    error::AppError,
    models::{
        student::Student,
        user::{LoginRequest, RegisterRequest, User},
    },
    utils::{
        csrf::{CSRF_COOKIE, csrf_cookie, generate_token},
        extract::ValidatedJson,
        hash::{hash_password, verify_password},
        jwt::{
            Claims, ROLE_STUDENT, ROLE_TEACHER, SESSION_COOKIE, session_cookie, sign_jwt,
            subscription_lapsed,
        },
        new_id,
    },
};

/// Attaches session and CSRF cookies to a JSON body.
fn session_response(
    jar: CookieJar,
    config: &Config,
    token: &str,
    mut body: Value,
) -> Result<Response, AppError> {
    let csrf_token = generate_token();

    body["token"] = json!(token);
    body["type"] = json!("Bearer");
    body["csrfToken"] = json!(csrf_token);

    let jar = jar
        .add(session_cookie(token.to_string(), config.cookie_secure))
        .add(csrf_cookie(csrf_token, config.cookie_secure));
    Ok((jar, Json(body)).into_response())
}

/// Registers a new teacher account.
///
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(pool): State<SqlitePool>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let hashed_password = hash_password(&payload.password)?;
    let email = payload.email.trim().to_lowercase();

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, name, email, role, password, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id, name, email, role, password, subscription_end_date, created_at
        "#,
    )
    .bind(new_id())
    .bind(payload.name.trim())
    .bind(&email)
    .bind(ROLE_TEACHER)
    .bind(hashed_password)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict(format!("Email '{}' is already registered", email)),
        other => {
            tracing::error!("Failed to register teacher: {:?}", other);
            other
        }
    })?;

    tracing::info!("Teacher registered: {}", user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

/// Teacher login. Sets the session and CSRF cookies and returns the token.
pub async fn login(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    jar: CookieJar,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<Response, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, name, email, role, password, subscription_end_date, created_at
         FROM users WHERE email = ?",
    )
    .bind(payload.email.trim().to_lowercase())
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::AuthError("Invalid email or password".to_string()))?;

    if !verify_password(&payload.password, &user.password) {
        return Err(AppError::AuthError("Invalid email or password".to_string()));
    }

    if subscription_lapsed(&user.role, user.subscription_end_date, Utc::now().date_naive()) {
        return Err(AppError::Forbidden("Subscription has expired".to_string()));
    }

    let token = sign_jwt(&user.id, &user.role, &config.jwt_secret, config.jwt_expiration)?;
    tracing::info!("Teacher logged in: {}", user.id);

    session_response(jar, &config, &token, json!({ "role": user.role, "user": user }))
}

/// Student login. Only active students with a password can sign in.
pub async fn student_login(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    jar: CookieJar,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<Response, AppError> {
    let student = sqlx::query_as::<_, Student>(
        "SELECT id, teacher_id, name, email, password, phone, parent_name, parent_phone,
                notes, status, created_at
         FROM students WHERE email = ?",
    )
    .bind(payload.email.trim().to_lowercase())
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::AuthError("Invalid email or password".to_string()))?;

    let valid = student
        .password
        .as_deref()
        .is_some_and(|hash| verify_password(&payload.password, hash));
    if !valid {
        return Err(AppError::AuthError("Invalid email or password".to_string()));
    }

    if student.status != "ACTIVE" {
        return Err(AppError::Forbidden("Student account is not active".to_string()));
    }

    let token = sign_jwt(&student.id, ROLE_STUDENT, &config.jwt_secret, config.jwt_expiration)?;
    tracing::info!("Student logged in: {}", student.id);

    session_response(jar, &config, &token, json!({ "role": ROLE_STUDENT, "student": student }))
}

/// Clears the session and CSRF cookies.
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar
        .remove(Cookie::build(SESSION_COOKIE).path("/"))
        .remove(Cookie::build(CSRF_COOKIE).path("/"));
    (jar, StatusCode::NO_CONTENT)
}

/// Returns the identity behind the current session.
pub async fn me(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    if claims.is_student() {
        let student = sqlx::query_as::<_, Student>(
            "SELECT id, teacher_id, name, email, password, phone, parent_name, parent_phone,
                    notes, status, created_at
             FROM students WHERE id = ?",
        )
        .bind(&claims.sub)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::AuthError("Session no longer valid".to_string()))?;
        return Ok(Json(json!({ "role": ROLE_STUDENT, "student": student })));
    }

    let user = sqlx::query_as::<_, User>(
        "SELECT id, name, email, role, password, subscription_end_date, created_at
         FROM users WHERE id = ?",
    )
    .bind(&claims.sub)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::AuthError("Session no longer valid".to_string()))?;

    Ok(Json(json!({ "role": user.role, "user": user })))
}

/// Issues (or re-issues) the CSRF cookie and echoes the token for the header.
pub async fn csrf_token(State(config): State<Config>, jar: CookieJar) -> impl IntoResponse {
    let token = jar
        .get(CSRF_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(generate_token);

    let jar = jar.add(csrf_cookie(token.clone(), config.cookie_secure));
    (jar, Json(json!({ "csrfToken": token })))
}
