use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    dtos::user::{RefreshTokenCreateRequest, UserCreateRequest},
    models::user::{AuthCredentials, RefreshToken, User, UserRole},
};

pub async fn exists_user_by_email<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    email: &str,
) -> Res<bool> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
        .bind(email)
        .fetch_one(executor)
        .await
        .map_err(AppError::from)
}

pub async fn exists_user_by_username<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    username: &str,
) -> Res<bool> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
        .bind(username)
        .fetch_one(executor)
        .await
        .map_err(AppError::from)
}

pub async fn get_user_by_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(executor)
        .await
        .map_err(AppError::from)
}

pub async fn find_user_by_email<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    email: &str,
) -> Res<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn insert_user<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: UserCreateRequest,
) -> Res<User> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, username, full_name, phone, role, account_status)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(data.email)
    .bind(data.username)
    .bind(data.full_name)
    .bind(data.phone)
    .bind(data.role)
    .bind(data.account_status)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

/// Turns an account created by gym staff into a regular one once its owner
/// registers.
pub async fn activate_user<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    full_name: &str,
    username: Option<&str>,
) -> Res<User> {
    sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET account_status = 'active', full_name = $2,
            username = COALESCE($3, username), updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(full_name)
    .bind(username)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn mark_onboarded<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    role: UserRole,
) -> Res<User> {
    sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET is_onboarded = TRUE, role = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(role)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn set_app_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    subscription_id: Uuid,
) -> Res<()> {
    sqlx::query("UPDATE users SET app_subscription_id = $2, updated_at = NOW() WHERE id = $1")
        .bind(user_id)
        .bind(subscription_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn insert_user_with_credentials<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: AuthCredentials,
) -> Res<()> {
    sqlx::query(
        r#"
        INSERT INTO auth_credentials (user_id, password_hash)
        VALUES ($1, $2)
        "#,
    )
    .bind(data.user_id)
    .bind(data.password_hash)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn get_credentials_by_email<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    email: &str,
) -> Res<Option<AuthCredentials>> {
    sqlx::query_as::<_, AuthCredentials>(
        r#"
        SELECT ac.user_id, ac.password_hash
        FROM auth_credentials ac
        JOIN users u ON u.id = ac.user_id
        WHERE LOWER(u.email) = LOWER($1)
        "#,
    )
    .bind(email)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

// === REFRESH TOKENS ===

pub async fn insert_refresh_token<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: RefreshTokenCreateRequest,
) -> Res<RefreshToken> {
    sqlx::query_as::<_, RefreshToken>(
        r#"
        INSERT INTO refresh_tokens (id, user_id, family_id, token_hash, expires_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(data.id)
    .bind(data.user_id)
    .bind(data.family_id)
    .bind(data.token_hash)
    .bind(data.expires_at)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn find_refresh_token<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    token_id: Uuid,
) -> Res<Option<RefreshToken>> {
    sqlx::query_as::<_, RefreshToken>("SELECT * FROM refresh_tokens WHERE id = $1")
        .bind(token_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

/// Marks a token as used. Returns `false` when another request revoked it first.
pub async fn revoke_refresh_token<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    token_id: Uuid,
    replaced_by: Option<Uuid>,
    now: DateTime<Utc>,
) -> Res<bool> {
    let result = sqlx::query(
        r#"
        UPDATE refresh_tokens SET revoked_at = $3, replaced_by = $2
        WHERE id = $1 AND revoked_at IS NULL
        "#,
    )
    .bind(token_id)
    .bind(replaced_by)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn revoke_refresh_family<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    family_id: Uuid,
    now: DateTime<Utc>,
) -> Res<u64> {
    let result = sqlx::query(
        "UPDATE refresh_tokens SET revoked_at = $2 WHERE family_id = $1 AND revoked_at IS NULL",
    )
    .bind(family_id)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}
