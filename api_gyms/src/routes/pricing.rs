use actix_web::{Responder, delete, get, post, put, web};
use common::{error::Res, http::Success, jwt::JwtClaims};
use db::models::membership::GymPermission;
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    dtos::gym::{CreateSubscriptionTypeRequest, UpdateSubscriptionTypeRequest},
    services::{permissions, pricing},
};

#[derive(Debug, Deserialize)]
pub struct TierQuery {
    pub duration: String,
}

/// Active subscription types of a gym, cheapest first.
#[get("/{gym_id}/pricing")]
pub async fn get_pricing(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
) -> Res<impl Responder> {
    let access =
        permissions::authorize(&pool, claims.user_id, path.into_inner(), &[GymPermission::PricingView])
            .await?;
    let mut conn = pool.acquire().await?;
    let types = pricing::list_types(&mut conn, access.gym.id).await?;
    Success::ok(types)
}

/// Price of the tier selling a duration preset.
///
/// # Input
/// - `duration` (query): preset such as `3_months`
///
/// # Output
/// - Success: the subscription type
/// - Error: 404 when no active tier sells that duration
#[get("/{gym_id}/pricing/lookup")]
pub async fn get_tier(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
    query: web::Query<TierQuery>,
) -> Res<impl Responder> {
    let access =
        permissions::authorize(&pool, claims.user_id, path.into_inner(), &[GymPermission::PricingView])
            .await?;
    let mut conn = pool.acquire().await?;
    let tier = pricing::lookup_tier(&mut conn, access.gym.id, &query.duration).await?;
    Success::ok(tier)
}

/// Creates a subscription type.
///
/// # Input
/// - `name`, `description`
/// - `duration` and `unit` (`day`, `week`, `month`, `year`)
/// - `price`: minor currency units
#[post("/{gym_id}/pricing")]
pub async fn post_pricing(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
    req: web::Json<CreateSubscriptionTypeRequest>,
) -> Res<impl Responder> {
    let access = permissions::authorize(
        &pool,
        claims.user_id,
        path.into_inner(),
        &[GymPermission::PricingManage],
    )
    .await?;
    let mut conn = pool.acquire().await?;
    let created = pricing::create_type(&mut conn, access.gym.id, req.into_inner()).await?;
    Success::created(created)
}

#[put("/{gym_id}/pricing/{type_id}")]
pub async fn put_pricing(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<(Uuid, Uuid)>,
    req: web::Json<UpdateSubscriptionTypeRequest>,
) -> Res<impl Responder> {
    let (gym_id, type_id) = path.into_inner();
    permissions::authorize(&pool, claims.user_id, gym_id, &[GymPermission::PricingManage]).await?;
    let mut conn = pool.acquire().await?;
    let updated = pricing::update_type(&mut conn, gym_id, type_id, req.into_inner()).await?;
    Success::ok(updated)
}

#[delete("/{gym_id}/pricing/{type_id}")]
pub async fn delete_pricing(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<(Uuid, Uuid)>,
) -> Res<impl Responder> {
    let (gym_id, type_id) = path.into_inner();
    permissions::authorize(&pool, claims.user_id, gym_id, &[GymPermission::PricingManage]).await?;
    let mut conn = pool.acquire().await?;
    pricing::deactivate_type(&mut conn, gym_id, type_id).await?;
    Success::message("Subscription type deactivated")
}
