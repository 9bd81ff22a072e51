use actix_web::{Responder, delete, get, post, put, web};
use chrono::Utc;
use common::{error::Res, http::Success, jwt::JwtClaims};
use db::models::membership::{GymPermission, MembershipSettings};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    dtos::member::{CreateMemberRequest, MemberFilter, MembersResponse, RenewRequest, UpdateStatusRequest},
    services::{membership, permissions},
};

/// Lists a gym's members, optionally filtered by membership status.
///
/// # Input
/// - `status` (query): `active`, `pending`, `banned`, `canceled` or `expired`
///
/// # Output
/// - Success: `{ members: [{ ...membership, user }] }`
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch(`/api/gyms/${gymId}/members?status=active`, {
///   headers: { 'Authorization': `Bearer ${accessToken}` }
/// });
/// const { data } = await response.json();
/// renderMembers(data.members);
/// ```
#[get("/{gym_id}/members")]
pub async fn get_members(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
    query: web::Query<MemberFilter>,
) -> Res<impl Responder> {
    let access = permissions::authorize(
        &pool,
        claims.user_id,
        path.into_inner(),
        &[GymPermission::MembersView],
    )
    .await?;
    let mut conn = pool.acquire().await?;
    let members = membership::list_members(&mut conn, access.gym.id, query.status).await?;
    Success::ok(MembersResponse { members })
}

/// Adds a member. An unknown email gets a `pending_setup` account.
///
/// # Input
/// - `email`, `fullName`, `phone`
/// - `subscription`: optional `{ typeId, startDate, duration, paymentMethod }`;
///   `duration` is a preset such as `3_months`, default `1_month`
///
/// # Output
/// - Success: 201 with `{ ...membership, user }`
/// - Error: 409 `MEMBER_ALREADY_EXISTS`
#[post("/{gym_id}/members")]
pub async fn post_member(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
    req: web::Json<CreateMemberRequest>,
) -> Res<impl Responder> {
    let access = permissions::authorize(
        &pool,
        claims.user_id,
        path.into_inner(),
        &[GymPermission::MembersCreate],
    )
    .await?;
    let mut tx = pool.begin().await?;
    let member =
        membership::create_member(&mut tx, &access.gym, req.into_inner(), Utc::now().date_naive())
            .await?;
    tx.commit().await?;
    Success::created(member)
}

#[get("/{gym_id}/members/{membership_id}")]
pub async fn get_member(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<(Uuid, Uuid)>,
) -> Res<impl Responder> {
    let (gym_id, membership_id) = path.into_inner();
    permissions::authorize(&pool, claims.user_id, gym_id, &[GymPermission::MembersView]).await?;
    let mut conn = pool.acquire().await?;
    let member = membership::get_member(&mut conn, gym_id, membership_id).await?;
    Success::ok(member)
}

#[put("/{gym_id}/members/{membership_id}/status")]
pub async fn put_member_status(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<(Uuid, Uuid)>,
    req: web::Json<UpdateStatusRequest>,
) -> Res<impl Responder> {
    let (gym_id, membership_id) = path.into_inner();
    permissions::authorize(&pool, claims.user_id, gym_id, &[GymPermission::MembersEdit]).await?;
    let mut tx = pool.begin().await?;
    let updated =
        membership::set_status(&mut tx, gym_id, membership_id, req.status, Utc::now().date_naive())
            .await?;
    tx.commit().await?;
    Success::ok(updated)
}

/// Renews a member's subscription.
///
/// # Input
/// - `typeId`: optional, defaults to the current type
/// - `startDate`: optional, defaults to the current end date while the
///   subscription still runs, otherwise today
/// - `duration`: preset used when no type is given, default `1_month`
///
/// # Output
/// - Success: the membership with its new subscription, status `active`
#[post("/{gym_id}/members/{membership_id}/renew")]
pub async fn post_renew(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<(Uuid, Uuid)>,
    req: web::Json<RenewRequest>,
) -> Res<impl Responder> {
    let (gym_id, membership_id) = path.into_inner();
    let access =
        permissions::authorize(&pool, claims.user_id, gym_id, &[GymPermission::MembersEdit]).await?;
    let mut tx = pool.begin().await?;
    let renewed = membership::renew(
        &mut tx,
        &access.gym,
        membership_id,
        req.into_inner(),
        Utc::now().date_naive(),
    )
    .await?;
    tx.commit().await?;
    Success::ok(renewed)
}

/// Soft deletes a member: the membership is kept with status `canceled`.
#[delete("/{gym_id}/members/{membership_id}")]
pub async fn delete_member(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<(Uuid, Uuid)>,
) -> Res<impl Responder> {
    let (gym_id, membership_id) = path.into_inner();
    permissions::authorize(&pool, claims.user_id, gym_id, &[GymPermission::MembersDelete]).await?;
    let mut tx = pool.begin().await?;
    membership::remove_member(&mut tx, gym_id, membership_id, Utc::now().date_naive()).await?;
    tx.commit().await?;
    Success::message("Member removed")
}

/// The caller's memberships across all gyms.
#[get("/me")]
pub async fn get_my_memberships(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let memberships =
        db::membership::get_memberships_by_user(pool.get_ref().as_ref(), claims.user_id).await?;
    Success::ok(memberships)
}

/// Replaces the caller's preferences for one gym.
///
/// # Input
/// - `weightUnit`: `kg` or `lbs`
/// - `classReminders`, `subscriptionRenewal`, `announcements`, `publicProfile`,
///   `shareProgressWithCoaches`: booleans, missing fields take their defaults
#[put("/{gym_id}/settings")]
pub async fn put_my_settings(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
    req: web::Json<MembershipSettings>,
) -> Res<impl Responder> {
    let mut conn = pool.acquire().await?;
    let updated =
        membership::update_my_settings(&mut conn, claims.user_id, path.into_inner(), req.into_inner())
            .await?;
    Success::ok(updated)
}
