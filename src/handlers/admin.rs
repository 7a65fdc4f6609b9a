// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    config::Config,
    error::AppError,
    models::user::{UpdateSubscriptionRequest, User},
    utils::{extract::ValidatedJson, hash::hash_password, jwt::ROLE_ADMIN, new_id},
};

/// Creates the admin account from `ADMIN_EMAIL`/`ADMIN_PASSWORD` unless that
/// email is already registered.
pub async fn seed_admin_user(pool: &SqlitePool, config: &Config) -> Result<(), AppError> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(());
    };
    let email = email.trim().to_lowercase();

    let existing: Option<String> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    tracing::info!("Seeding admin user: {}", email);
    sqlx::query(
        "INSERT INTO users (id, name, email, role, password, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(new_id())
    .bind("Admin")
    .bind(&email)
    .bind(ROLE_ADMIN)
    .bind(hash_password(password)?)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    tracing::info!("Admin user created successfully.");
    Ok(())
}

/// Lists all teacher accounts.
/// Admin only.
pub async fn list_teachers(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT id, name, email, role, password, subscription_end_date, created_at
        FROM users
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list teachers: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(users))
}

/// Sets or clears a teacher's subscription end date.
/// Admin only.
pub async fn update_subscription(
    State(pool): State<SqlitePool>,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<UpdateSubscriptionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET subscription_end_date = ?
        WHERE id = ?
        RETURNING id, name, email, role, password, subscription_end_date, created_at
        "#,
    )
    .bind(payload.subscription_end_date)
    .bind(&id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Teacher not found".to_string()))?;

    tracing::info!(
        "Subscription of {} set to {:?}",
        user.id,
        user.subscription_end_date
    );
    Ok(Json(user))
}
