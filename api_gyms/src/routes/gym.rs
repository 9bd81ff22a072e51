use actix_web::{Responder, get, post, put, web};
use chrono::Utc;
use common::{error::Res, http::Success, jwt::JwtClaims};
use db::models::{membership::GymPermission, user::UserRole};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    dtos::gym::{CreateGymRequest, GymsResponse, MyPermissionsResponse, UpdateGymRequest},
    services::{gym, permissions},
};

/// Creates a gym owned by the caller.
///
/// # Input
/// - `name`: display name, the slug is derived from it
/// - `address`, `city`, `country`: optional
/// - `currency`: optional ISO code, defaults to `DZD`
/// - `settings`: optional `{ openingHours, allowSelfCheckIn, requireActiveSubscription, timezone }`
///
/// # Output
/// - Success: 201 with the gym
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/gyms', {
///   method: 'POST',
///   headers: {
///     'Content-Type': 'application/json',
///     'Authorization': `Bearer ${accessToken}`
///   },
///   body: JSON.stringify({ name: 'Iron Temple', city: 'Oran' })
/// });
/// const { data: gym } = await response.json();
/// ```
#[post("")]
pub async fn post_gym(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    req: web::Json<CreateGymRequest>,
) -> Res<impl Responder> {
    let mut tx = pool.begin().await?;
    let gym = gym::create_gym(&mut tx, claims.user_id, req.into_inner()).await?;
    tx.commit().await?;
    Success::created(gym)
}

/// Gyms the caller owns or holds an active membership in.
#[get("")]
pub async fn get_my_gyms(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let gyms = db::gym::get_gyms_for_user(pool.get_ref().as_ref(), claims.user_id).await?;
    Success::ok(GymsResponse { gyms })
}

#[get("/{gym_id}")]
pub async fn get_gym(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
) -> Res<impl Responder> {
    let access = permissions::authorize(&pool, claims.user_id, path.into_inner(), &[]).await?;
    Success::ok(access.gym)
}

/// Updates gym details and settings. Needs `settings:manage`.
///
/// # Input
/// - `name`, `address`, `city`: optional
/// - `settings`: optional, replaces the whole settings object
#[put("/{gym_id}")]
pub async fn put_gym(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
    req: web::Json<UpdateGymRequest>,
) -> Res<impl Responder> {
    let access = permissions::authorize(
        &pool,
        claims.user_id,
        path.into_inner(),
        &[GymPermission::SettingsManage],
    )
    .await?;
    let req = req.into_inner();
    let gym = db::gym::update_gym(
        pool.get_ref().as_ref(),
        access.gym.id,
        req.name,
        req.address,
        req.city,
        req.settings,
    )
    .await?;
    Success::ok(gym)
}

/// Recomputes the member counters of a gym.
///
/// # Output
/// - Success: `{ totalMembers, activeMembers, expiredMembers, pendingMembers }`
#[post("/{gym_id}/stats/refresh")]
pub async fn post_refresh_stats(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
) -> Res<impl Responder> {
    let access = permissions::authorize(
        &pool,
        claims.user_id,
        path.into_inner(),
        &[GymPermission::AnalyticsView, GymPermission::MembersView],
    )
    .await?;
    let mut conn = pool.acquire().await?;
    let stats = gym::refresh_stats(&mut conn, access.gym.id, Utc::now().date_naive()).await?;
    Success::ok(stats)
}

/// The caller's resolved permissions in a gym, used by the dashboard to
/// hide actions.
///
/// # Output
/// - Success: `{ isOwner, rolePermissions: { canManageMembers, ... }, permissions: ["members:view", ...] }`
///
/// # Frontend Example
/// ```javascript
/// const { data } = await (await fetch(`/api/gyms/${gymId}/permissions/me`, {
///   headers: { 'Authorization': `Bearer ${accessToken}` }
/// })).json();
/// const canAddMembers = data.permissions.includes('members:create');
/// ```
#[get("/{gym_id}/permissions/me")]
pub async fn get_my_permissions(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
) -> Res<impl Responder> {
    let access = permissions::authorize(&pool, claims.user_id, path.into_inner(), &[]).await?;
    let is_owner = access.gym.owner_id == claims.user_id;
    let role_permissions = match &access.membership {
        Some(m) if !is_owner => permissions::resolve_role_permissions(
            &m.roles,
            m.custom_permissions.as_ref().map(|c| &c.0),
        ),
        _ => permissions::resolve_role_permissions(&[UserRole::Owner], None),
    };
    Success::ok(MyPermissionsResponse {
        is_owner,
        role_permissions,
        permissions: access.permissions,
    })
}
