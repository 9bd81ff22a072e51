use actix_web::{Responder, delete, get, post, web};
use api_gyms::services::permissions;
use chrono::Utc;
use common::{error::Res, http::Success, jwt::JwtClaims};
use db::models::membership::GymPermission;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    dtos::coaching::{CoachRequestBody, InviteCoachRequest, RespondRequest},
    services::affiliation,
};

/// The caller's pending and active gym affiliations, as a coach.
#[get("/affiliations")]
pub async fn get_my_affiliations(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let mut conn = pool.acquire().await?;
    let affiliations = affiliation::for_coach(&mut conn, claims.user_id).await?;
    Success::ok(affiliations)
}

/// Coaches affiliated with a gym. Needs `staff:view`.
#[get("/gyms/{gym_id}/coaches")]
pub async fn get_gym_coaches(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
) -> Res<impl Responder> {
    let access = permissions::authorize(
        &pool,
        claims.user_id,
        path.into_inner(),
        &[GymPermission::StaffView],
    )
    .await?;
    let mut conn = pool.acquire().await?;
    let affiliations = affiliation::for_gym(&mut conn, access.gym.id).await?;
    Success::ok(affiliations)
}

/// Invites a coach to work with the gym. Needs `staff:manage`.
///
/// # Input
/// - `coachId`
/// - `message`: optional
/// - `permissions`: `{ canScheduleSessions, canAccessFacilities }`, both
///   default true
/// - `isExclusive`: default false
/// - `commissionRate`: optional, 0 to 100
///
/// # Output
/// - Success: 201 with the affiliation
/// - Error: 404 `COACH_NOT_FOUND`, 409 `AFFILIATION_ALREADY_EXISTS`
#[post("/gyms/{gym_id}/coaches/invite")]
pub async fn post_invite_coach(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
    req: web::Json<InviteCoachRequest>,
) -> Res<impl Responder> {
    let access = permissions::authorize(
        &pool,
        claims.user_id,
        path.into_inner(),
        &[GymPermission::StaffManage],
    )
    .await?;
    let mut tx = pool.begin().await?;
    let created = affiliation::invite(&mut tx, &access.gym, req.into_inner()).await?;
    tx.commit().await?;
    Success::created(created)
}

/// A coach asks to work with a gym.
#[post("/gyms/{gym_id}/coaches/request")]
pub async fn post_request_gym(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
    req: web::Json<CoachRequestBody>,
) -> Res<impl Responder> {
    let mut tx = pool.begin().await?;
    let created =
        affiliation::request_gym(&mut tx, claims.user_id, path.into_inner(), req.into_inner().message)
            .await?;
    tx.commit().await?;
    Success::created(created)
}

/// Answers a pending affiliation. The coach answers gym invites; gym staff
/// with `staff:manage` answer coach requests.
///
/// # Input
/// - `accept`: boolean
///
/// # Output
/// - Error: 400 `AFFILIATION_INVALID_ACTION` when it is no longer pending
#[post("/affiliations/{affiliation_id}/respond")]
pub async fn post_respond_affiliation(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
    req: web::Json<RespondRequest>,
) -> Res<impl Responder> {
    let mut tx = pool.begin().await?;
    let current = affiliation::locked(&mut tx, path.into_inner()).await?;
    let side = affiliation::party(&pool, &current, claims.user_id).await?;
    let saved = affiliation::respond(&mut tx, current, side, req.accept, Utc::now()).await?;
    tx.commit().await?;
    Success::ok(saved)
}

/// Ends an affiliation. Either side may call this.
#[delete("/affiliations/{affiliation_id}")]
pub async fn delete_affiliation(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
) -> Res<impl Responder> {
    let mut tx = pool.begin().await?;
    let current = affiliation::locked(&mut tx, path.into_inner()).await?;
    affiliation::party(&pool, &current, claims.user_id).await?;
    let saved = affiliation::terminate(&mut tx, current, Utc::now()).await?;
    tx.commit().await?;
    Success::ok(saved)
}
