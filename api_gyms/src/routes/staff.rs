use actix_web::{Responder, delete, get, post, put, web};
use chrono::Utc;
use common::{error::Res, http::Success, jwt::JwtClaims};
use db::models::membership::GymPermission;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    dtos::member::{AddStaffRequest, UpdateStaffRequest},
    services::{permissions, staff},
};

#[get("/{gym_id}/staff")]
pub async fn get_staff(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
) -> Res<impl Responder> {
    let access =
        permissions::authorize(&pool, claims.user_id, path.into_inner(), &[GymPermission::StaffView])
            .await?;
    let mut conn = pool.acquire().await?;
    let staff = staff::list_staff(&mut conn, access.gym.id).await?;
    Success::ok(staff)
}

/// Adds a staff member.
///
/// # Input
/// - `email`: the user to add; `fullName` is required when the email is unknown
/// - `roles`: one or more of `manager`, `receptionist`, `coach`, `cleaner`,
///   `maintenance`, `security`
/// - `permissions`: optional explicit list such as `["members:view"]`,
///   otherwise the role defaults
/// - `customPermissions`: optional overrides of the role table
///
/// # Output
/// - Success: 201 with the membership
/// - Error: 409 `STAFF_ALREADY_EXISTS`
///
/// # Frontend Example
/// ```javascript
/// await fetch(`/api/gyms/${gymId}/staff`, {
///   method: 'POST',
///   headers: {
///     'Content-Type': 'application/json',
///     'Authorization': `Bearer ${accessToken}`
///   },
///   body: JSON.stringify({ email: 'coach@example.com', fullName: 'Sam', roles: ['coach'] })
/// });
/// ```
#[post("/{gym_id}/staff")]
pub async fn post_staff(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
    req: web::Json<AddStaffRequest>,
) -> Res<impl Responder> {
    let access =
        permissions::authorize(&pool, claims.user_id, path.into_inner(), &[GymPermission::StaffManage])
            .await?;
    let mut tx = pool.begin().await?;
    let membership = staff::add_staff(&mut tx, &access.gym, req.into_inner()).await?;
    tx.commit().await?;
    Success::created(membership)
}

/// Changes a staff member's roles or permissions. New roles without an
/// explicit list reset the permissions to the role defaults.
#[put("/{gym_id}/staff/{membership_id}")]
pub async fn put_staff(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<(Uuid, Uuid)>,
    req: web::Json<UpdateStaffRequest>,
) -> Res<impl Responder> {
    let (gym_id, membership_id) = path.into_inner();
    permissions::authorize(&pool, claims.user_id, gym_id, &[GymPermission::StaffManage]).await?;
    let mut conn = pool.acquire().await?;
    let membership = staff::update_staff(&mut conn, gym_id, membership_id, req.into_inner()).await?;
    Success::ok(membership)
}

#[delete("/{gym_id}/staff/{membership_id}")]
pub async fn delete_staff(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<(Uuid, Uuid)>,
) -> Res<impl Responder> {
    let (gym_id, membership_id) = path.into_inner();
    permissions::authorize(&pool, claims.user_id, gym_id, &[GymPermission::StaffManage]).await?;
    let mut tx = pool.begin().await?;
    let membership =
        staff::remove_staff(&mut tx, gym_id, membership_id, Utc::now().date_naive()).await?;
    tx.commit().await?;
    Success::ok(membership)
}
