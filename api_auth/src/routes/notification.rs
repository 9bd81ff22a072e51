use std::sync::Arc;

use actix_web::{Responder, get, post, web};
use common::{error::Res, http::Success, jwt::JwtClaims};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    dtos::user::{NotificationQuery, UnreadCountResponse},
    services::notification,
};

/// Lists the caller's notifications, newest first.
///
/// Notifications carry a translation `key` and its `vars`; the client
/// renders the text.
///
/// # Input
/// - `unreadOnly` (query): default `false`
/// - `limit` (query): 1 to 100, default 50
///
/// # Output
/// - Success: `{ notifications: [...], unreadCount }`
#[get("/notifications")]
pub async fn get_notifications(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    query: web::Query<NotificationQuery>,
) -> Res<impl Responder> {
    let mut conn = pool.acquire().await?;
    let inbox = notification::list(&mut conn, claims.user_id, query.into_inner()).await?;
    Success::ok(inbox)
}

#[get("/notifications/unread-count")]
pub async fn get_unread_count(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let mut conn = pool.acquire().await?;
    let count = notification::unread_count(&mut conn, claims.user_id).await?;
    Success::ok(UnreadCountResponse { count })
}

#[post("/notifications/read-all")]
pub async fn post_read_all(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let mut conn = pool.acquire().await?;
    let updated = notification::mark_all_read(&mut conn, claims.user_id).await?;
    log::debug!("Marked {} notification(s) read for {}", updated, claims.user_id);
    Success::message("All notifications marked as read")
}

#[post("/notifications/{notification_id}/read")]
pub async fn post_read(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
) -> Res<impl Responder> {
    let mut conn = pool.acquire().await?;
    notification::mark_read(&mut conn, claims.user_id, path.into_inner()).await?;
    Success::message("Notification marked as read")
}
