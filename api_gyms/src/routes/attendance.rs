use actix_web::{Responder, get, post, web};
use chrono::Utc;
use common::{
    error::{AppError, ErrorCode, Res},
    http::Success,
    jwt::JwtClaims,
};
use db::models::membership::GymPermission;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    dtos::operations::{AttendanceQuery, AttendanceResponse, CheckInRequest, CheckOutRequest},
    services::{
        attendance::{self, CheckInOutcome},
        permissions,
    },
};

/// Checks a member into the gym.
///
/// Staff with `attendance:checkin` may check anyone in. Members may check
/// themselves in when the gym allows self check-in. A refused attempt is
/// still recorded with status `denied`.
///
/// # Input
/// - `userId`: optional, defaults to the caller
/// - `notes`: optional
///
/// # Output
/// - Success: 201 with the attendance record
/// - Error: 403 `MEMBERSHIP_INACTIVE` with the denial reason, 409 when
///   already checked in
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch(`/api/gyms/${gymId}/attendance/check-in`, {
///   method: 'POST',
///   headers: {
///     'Content-Type': 'application/json',
///     'Authorization': `Bearer ${accessToken}`
///   },
///   body: JSON.stringify({ userId: scannedMemberId })
/// });
/// const result = await response.json();
/// if (!result.success && result.errorCode === 'MEMBERSHIP_INACTIVE') {
///   showDenied(result.message);
/// }
/// ```
#[post("/{gym_id}/attendance/check-in")]
pub async fn post_check_in(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
    req: Option<web::Json<CheckInRequest>>,
) -> Res<impl Responder> {
    let gym_id = path.into_inner();
    let req = req.map(|r| r.into_inner()).unwrap_or_default();
    let target = req.user_id.unwrap_or(claims.user_id);

    let access = permissions::authorize(&pool, claims.user_id, gym_id, &[]).await?;
    let settings = access.gym.settings.0.clone();
    if !attendance::is_self_service(claims.user_id, target, &settings)
        && !access.can(GymPermission::AttendanceCheckin)
    {
        return Err(AppError::coded(
            ErrorCode::InsufficientPermissions,
            "You do not have permission to check members in",
        ));
    }

    let mut tx = pool.begin().await?;
    let outcome = attendance::check_in(
        &mut tx,
        gym_id,
        &settings,
        target,
        req.notes,
        Utc::now().date_naive(),
    )
    .await?;
    tx.commit().await?;

    match outcome {
        CheckInOutcome::Admitted(record) => Success::created(record),
        CheckInOutcome::Denied { reason, .. } => Err(AppError::coded(
            ErrorCode::MembershipInactive,
            format!("Check-in denied: {}", reason),
        )),
    }
}

#[post("/{gym_id}/attendance/check-out")]
pub async fn post_check_out(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
    req: Option<web::Json<CheckOutRequest>>,
) -> Res<impl Responder> {
    let gym_id = path.into_inner();
    let target = req
        .and_then(|r| r.into_inner().user_id)
        .unwrap_or(claims.user_id);

    let access = permissions::authorize(&pool, claims.user_id, gym_id, &[]).await?;
    if target != claims.user_id && !access.can(GymPermission::AttendanceCheckin) {
        return Err(AppError::coded(
            ErrorCode::InsufficientPermissions,
            "You do not have permission to check members out",
        ));
    }

    let mut conn = pool.acquire().await?;
    let record = attendance::check_out(&mut conn, gym_id, target, Utc::now()).await?;
    Success::ok(record)
}

/// Attendance records between two dates, inclusive.
///
/// # Input
/// - `from`, `to` (query): `YYYY-MM-DD`, default the last seven days
#[get("/{gym_id}/attendance")]
pub async fn get_attendance(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
    query: web::Query<AttendanceQuery>,
) -> Res<impl Responder> {
    let access = permissions::authorize(
        &pool,
        claims.user_id,
        path.into_inner(),
        &[GymPermission::AttendanceView],
    )
    .await?;
    let mut conn = pool.acquire().await?;
    let records = attendance::list(
        &mut conn,
        access.gym.id,
        query.from,
        query.to,
        Utc::now().date_naive(),
    )
    .await?;
    Success::ok(AttendanceResponse { records })
}
