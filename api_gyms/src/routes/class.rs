use actix_web::{Responder, delete, get, post, web};
use chrono::Utc;
use common::{error::Res, http::Success, jwt::JwtClaims};
use db::models::membership::GymPermission;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    dtos::operations::CreateClassRequest,
    services::{class, permissions},
};

/// Classes that have not ended yet. Open to every active member.
#[get("/{gym_id}/classes")]
pub async fn get_classes(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
) -> Res<impl Responder> {
    let access = permissions::authorize(&pool, claims.user_id, path.into_inner(), &[]).await?;
    let mut conn = pool.acquire().await?;
    let classes = class::upcoming(&mut conn, access.gym.id, Utc::now()).await?;
    Success::ok(classes)
}

/// Schedules a class. Needs `schedules:manage`.
///
/// # Input
/// - `name`, `description`
/// - `coachId`: optional, must hold the coach role in this gym
/// - `startsAt`, `endsAt`: RFC 3339 timestamps
/// - `capacity`: positive
#[post("/{gym_id}/classes")]
pub async fn post_class(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
    req: web::Json<CreateClassRequest>,
) -> Res<impl Responder> {
    let access = permissions::authorize(
        &pool,
        claims.user_id,
        path.into_inner(),
        &[GymPermission::SchedulesManage],
    )
    .await?;
    let mut conn = pool.acquire().await?;
    let created = class::create_class(&mut conn, access.gym.id, req.into_inner(), Utc::now()).await?;
    Success::created(created)
}

/// Books the caller into a class.
///
/// # Output
/// - Success: 201 with the booking
/// - Error: 409 `CLASS_FULL`, 409 when already booked
#[post("/{gym_id}/classes/{class_id}/book")]
pub async fn post_booking(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<(Uuid, Uuid)>,
) -> Res<impl Responder> {
    let (gym_id, class_id) = path.into_inner();
    let mut tx = pool.begin().await?;
    let booking = class::book(&mut tx, gym_id, class_id, claims.user_id, Utc::now()).await?;
    tx.commit().await?;
    Success::created(booking)
}

#[delete("/{gym_id}/classes/{class_id}/book")]
pub async fn delete_booking(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<(Uuid, Uuid)>,
) -> Res<impl Responder> {
    let (gym_id, class_id) = path.into_inner();
    let mut tx = pool.begin().await?;
    let booking = class::cancel_booking(&mut tx, gym_id, class_id, claims.user_id).await?;
    tx.commit().await?;
    Success::ok(booking)
}
