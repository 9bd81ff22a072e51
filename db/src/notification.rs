use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{dtos::user::NotificationCreateRequest, models::operations::AppNotification};

pub async fn insert_notification<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: NotificationCreateRequest,
) -> Res<AppNotification> {
    sqlx::query_as::<_, AppNotification>(
        "INSERT INTO notifications (user_id, key, vars) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(data.user_id)
    .bind(data.key)
    .bind(data.vars)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_notifications<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    unread_only: bool,
    limit: i64,
) -> Res<Vec<AppNotification>> {
    sqlx::query_as::<_, AppNotification>(
        r#"
        SELECT * FROM notifications
        WHERE user_id = $1 AND ($2 = FALSE OR is_read = FALSE)
        ORDER BY created_at DESC
        LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(unread_only)
    .bind(limit)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn count_unread<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE")
        .bind(user_id)
        .fetch_one(executor)
        .await
        .map_err(AppError::from)
}

/// Marks one notification read. Returns `false` if it does not belong to the user.
pub async fn mark_read<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    notification_id: Uuid,
) -> Res<bool> {
    let result =
        sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2")
            .bind(notification_id)
            .bind(user_id)
            .execute(executor)
            .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn mark_all_read<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<u64> {
    let result =
        sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE")
            .bind(user_id)
            .execute(executor)
            .await?;
    Ok(result.rows_affected())
}
