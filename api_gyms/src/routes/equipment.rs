use actix_web::{Responder, delete, get, post, put, web};
use common::{error::Res, http::Success, jwt::JwtClaims};
use db::models::membership::GymPermission;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    dtos::operations::EquipmentRequest,
    services::{equipment, permissions},
};

#[get("/{gym_id}/equipment")]
pub async fn get_equipment(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
) -> Res<impl Responder> {
    let access = permissions::authorize(
        &pool,
        claims.user_id,
        path.into_inner(),
        &[GymPermission::SettingsView, GymPermission::SettingsManage],
    )
    .await?;
    let mut conn = pool.acquire().await?;
    let items = equipment::list(&mut conn, access.gym.id).await?;
    Success::ok(items)
}

/// Adds an equipment item.
///
/// # Input
/// - `name`, `category`, `notes`
/// - `quantity`: default 1
/// - `condition`: `new`, `good` (default), `needs_repair` or `out_of_service`
/// - `purchasedAt`: optional `YYYY-MM-DD`
#[post("/{gym_id}/equipment")]
pub async fn post_equipment(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
    req: web::Json<EquipmentRequest>,
) -> Res<impl Responder> {
    let access = permissions::authorize(
        &pool,
        claims.user_id,
        path.into_inner(),
        &[GymPermission::SettingsManage],
    )
    .await?;
    let mut conn = pool.acquire().await?;
    let item = equipment::create(&mut conn, access.gym.id, req.into_inner()).await?;
    Success::created(item)
}

#[put("/{gym_id}/equipment/{item_id}")]
pub async fn put_equipment(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<(Uuid, Uuid)>,
    req: web::Json<EquipmentRequest>,
) -> Res<impl Responder> {
    let (gym_id, item_id) = path.into_inner();
    permissions::authorize(&pool, claims.user_id, gym_id, &[GymPermission::SettingsManage]).await?;
    let mut conn = pool.acquire().await?;
    let item = equipment::update(&mut conn, gym_id, item_id, req.into_inner()).await?;
    Success::ok(item)
}

#[delete("/{gym_id}/equipment/{item_id}")]
pub async fn delete_equipment(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<(Uuid, Uuid)>,
) -> Res<impl Responder> {
    let (gym_id, item_id) = path.into_inner();
    permissions::authorize(&pool, claims.user_id, gym_id, &[GymPermission::SettingsManage]).await?;
    let mut conn = pool.acquire().await?;
    equipment::delete(&mut conn, gym_id, item_id).await?;
    Success::message("Equipment item deleted")
}
