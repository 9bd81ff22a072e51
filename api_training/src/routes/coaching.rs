use actix_web::{Responder, delete, get, post, web};
use chrono::Utc;
use common::{error::Res, http::Success, jwt::JwtClaims};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    dtos::coaching::{AssignProgramRequest, CoachRequestBody, RespondRequest},
    services::coaching,
};

/// Requests the caller sent, in any state.
#[get("/requests/sent")]
pub async fn get_sent_requests(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let mut conn = pool.acquire().await?;
    let requests = coaching::sent_requests(&mut conn, claims.user_id).await?;
    Success::ok(requests)
}

/// Pending requests waiting on the caller.
#[get("/requests/received")]
pub async fn get_received_requests(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let mut conn = pool.acquire().await?;
    let requests = coaching::received_requests(&mut conn, claims.user_id).await?;
    Success::ok(requests)
}

/// Asks a coach to train the caller.
///
/// # Input
/// - `message`: optional
///
/// # Output
/// - Success: 201 with the request
/// - Error: 404 `COACH_NOT_FOUND`, 409 `COACH_REQUEST_ALREADY_EXISTS`
#[post("/coaches/{coach_id}/request")]
pub async fn post_request_coach(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
    req: web::Json<CoachRequestBody>,
) -> Res<impl Responder> {
    let mut tx = pool.begin().await?;
    let request =
        coaching::request_coach(&mut tx, claims.user_id, path.into_inner(), req.into_inner().message)
            .await?;
    tx.commit().await?;
    Success::created(request)
}

/// A coach offers to train a member.
#[post("/members/{member_id}/request")]
pub async fn post_offer_coaching(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
    req: web::Json<CoachRequestBody>,
) -> Res<impl Responder> {
    let mut tx = pool.begin().await?;
    let request =
        coaching::offer_coaching(&mut tx, claims.user_id, path.into_inner(), req.into_inner().message)
            .await?;
    tx.commit().await?;
    Success::created(request)
}

/// Accepts or declines a request addressed to the caller.
///
/// # Input
/// - `accept`: boolean
/// - `response`: optional note for the sender
///
/// # Output
/// - Success: 200 with the updated request
/// - Error: 403 when the caller is not the recipient, 409 when the member
///   already has a coach
#[post("/requests/{request_id}/respond")]
pub async fn post_respond_request(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
    req: web::Json<RespondRequest>,
) -> Res<impl Responder> {
    let req = req.into_inner();
    let mut tx = pool.begin().await?;
    let request = coaching::respond(
        &mut tx,
        path.into_inner(),
        claims.user_id,
        req.accept,
        req.response,
        Utc::now(),
    )
    .await?;
    tx.commit().await?;
    Success::ok(request)
}

/// The caller's active clients with their current program.
#[get("/clients")]
pub async fn get_clients(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let mut conn = pool.acquire().await?;
    let clients = coaching::clients(&mut conn, claims.user_id).await?;
    Success::ok(clients)
}

#[delete("/clients/{client_id}")]
pub async fn delete_client(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
) -> Res<impl Responder> {
    let mut tx = pool.begin().await?;
    let ended = coaching::end_relationship(&mut tx, claims.user_id, path.into_inner(), Utc::now()).await?;
    tx.commit().await?;
    Success::ok(ended)
}

/// Starts a program for a client. Their open run is abandoned.
///
/// # Input
/// - `programId`
///
/// # Output
/// - Success: 201 with the client's new run
/// - Error: 403 when the user is not the caller's client
#[post("/clients/{client_id}/program")]
pub async fn post_assign_program(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
    req: web::Json<AssignProgramRequest>,
) -> Res<impl Responder> {
    let mut tx = pool.begin().await?;
    let run = coaching::assign_program(
        &mut tx,
        claims.user_id,
        path.into_inner(),
        req.program_id,
        Utc::now(),
    )
    .await?;
    tx.commit().await?;
    Success::created(run)
}

/// Withdraws the program the caller assigned.
#[delete("/clients/{client_id}/program")]
pub async fn delete_assigned_program(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
) -> Res<impl Responder> {
    let mut tx = pool.begin().await?;
    let run = coaching::unassign_program(&mut tx, claims.user_id, path.into_inner(), Utc::now()).await?;
    tx.commit().await?;
    Success::ok(run)
}
