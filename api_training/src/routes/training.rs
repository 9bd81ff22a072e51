use actix_web::{Responder, get, post, put, web};
use chrono::Utc;
use common::{error::Res, http::Success, jwt::JwtClaims};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    dtos::training::{ProgramQuery, ProgramRequest, SessionRequest},
    services::{history, program},
};

/// Programs the caller can see: templates, public programs and their own.
///
/// # Input
/// - `creationType` (query): `member`, `coach` or `template`
/// - `mine` (query): only the caller's programs
/// - `search` (query): matched against the name
#[get("/programs")]
pub async fn get_programs(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    query: web::Query<ProgramQuery>,
) -> Res<impl Responder> {
    let mut conn = pool.acquire().await?;
    let programs = program::list_programs(&mut conn, claims.user_id, query.into_inner()).await?;
    Success::ok(programs)
}

/// Creates a program authored by the caller.
///
/// # Input
/// - `name`, `description`
/// - `experience`: `beginner`, `intermediate` or `advanced`
/// - `purpose`: `strength`, `hypertrophy`, `weight_loss`, `endurance`,
///   `mobility` or `general_fitness`
/// - `daysPerWeek`: 1 to 7
/// - `durationWeeks`: 1 to 104, default 12
/// - `days`: `[{ name, exercises: [{ name, recommendedSets, ... }] }]`
/// - `isPublic`: default false
///
/// # Output
/// - Success: 201 with the program
/// - Error: 422 `VALIDATION_ERROR`
///
/// # Frontend Example
/// ```javascript
/// await fetch('/api/training/programs', {
///   method: 'POST',
///   headers: { 'Content-Type': 'application/json', Authorization: `Bearer ${token}` },
///   body: JSON.stringify({ name: 'Full body', experience: 'beginner',
///     purpose: 'general_fitness', daysPerWeek: 3, days: [{ name: 'A', exercises: [] }] }),
/// });
/// ```
#[post("/programs")]
pub async fn post_program(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    req: web::Json<ProgramRequest>,
) -> Res<impl Responder> {
    let mut conn = pool.acquire().await?;
    let created = program::create_program(&mut conn, claims.user_id, req.into_inner()).await?;
    Success::created(created)
}

#[get("/programs/{program_id}")]
pub async fn get_program(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
) -> Res<impl Responder> {
    let mut conn = pool.acquire().await?;
    let found = program::visible_program(&mut conn, claims.user_id, path.into_inner()).await?;
    Success::ok(found)
}

/// Replaces a program. Only its author may call this.
#[put("/programs/{program_id}")]
pub async fn put_program(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
    req: web::Json<ProgramRequest>,
) -> Res<impl Responder> {
    let mut conn = pool.acquire().await?;
    let updated =
        program::update_program(&mut conn, claims.user_id, path.into_inner(), req.into_inner()).await?;
    Success::ok(updated)
}

/// Starts a program for the caller. An open run is abandoned first.
///
/// # Output
/// - Success: 201 with the new run
/// - Error: 404 `PROGRAM_NOT_FOUND`
#[post("/programs/{program_id}/start")]
pub async fn post_start_program(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
) -> Res<impl Responder> {
    let mut tx = pool.begin().await?;
    let run = history::start_own(&mut tx, claims.user_id, path.into_inner(), Utc::now()).await?;
    tx.commit().await?;
    Success::created(run)
}

/// The caller's active or paused run.
///
/// # Output
/// - Error: 404 `NO_ACTIVE_PROGRAM`
#[get("/active")]
pub async fn get_active(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let mut conn = pool.acquire().await?;
    let run = history::active(&mut conn, claims.user_id).await?;
    Success::ok(run)
}

/// # Output
/// - Error: 429 `PROGRAM_PAUSE_LIMIT_EXCEEDED` after three pauses in a day
#[post("/active/pause")]
pub async fn post_pause(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let mut tx = pool.begin().await?;
    let run = history::pause_active(&mut tx, claims.user_id, Utc::now()).await?;
    tx.commit().await?;
    Success::ok(run)
}

#[post("/active/resume")]
pub async fn post_resume(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let mut tx = pool.begin().await?;
    let run = history::resume_active(&mut tx, claims.user_id).await?;
    tx.commit().await?;
    Success::ok(run)
}

/// Logs a workout against the active run.
///
/// # Input
/// - `dayName`
/// - `date`: optional `YYYY-MM-DD`, defaults to today
/// - `exercises`: `[{ exerciseName, sets: [{ reps, weight, completed }], notes }]`
/// - `notes`
///
/// # Output
/// - Success: 200 with the run; its status is `completed` after the last day
#[post("/sessions")]
pub async fn post_session(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    req: web::Json<SessionRequest>,
) -> Res<impl Responder> {
    let mut tx = pool.begin().await?;
    let run = history::log_session(&mut tx, claims.user_id, req.into_inner(), Utc::now()).await?;
    tx.commit().await?;
    Success::ok(run)
}

#[get("/history")]
pub async fn get_history(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let mut conn = pool.acquire().await?;
    let runs = history::runs(&mut conn, claims.user_id).await?;
    Success::ok(runs)
}
