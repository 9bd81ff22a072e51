use common::error::{AppError, Res};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::dtos::user::{NotificationQuery, NotificationsResponse};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;

fn page_size(requested: Option<i64>) -> i64 {
    requested.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

pub async fn list(conn: &mut PgConnection, user_id: Uuid, query: NotificationQuery) -> Res<NotificationsResponse> {
    let notifications =
        db::notification::get_notifications(&mut *conn, user_id, query.unread_only, page_size(query.limit))
            .await?;
    let unread_count = db::notification::count_unread(&mut *conn, user_id).await?;
    Ok(NotificationsResponse {
        notifications,
        unread_count,
    })
}

pub async fn unread_count(conn: &mut PgConnection, user_id: Uuid) -> Res<i64> {
    db::notification::count_unread(&mut *conn, user_id).await
}

pub async fn mark_read(conn: &mut PgConnection, user_id: Uuid, notification_id: Uuid) -> Res<()> {
    if !db::notification::mark_read(&mut *conn, user_id, notification_id).await? {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }
    Ok(())
}

pub async fn mark_all_read(conn: &mut PgConnection, user_id: Uuid) -> Res<u64> {
    db::notification::mark_all_read(&mut *conn, user_id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_clamped() {
        assert_eq!(page_size(None), 50);
        assert_eq!(page_size(Some(0)), 1);
        assert_eq!(page_size(Some(500)), 100);
        assert_eq!(page_size(Some(20)), 20);
    }
}
