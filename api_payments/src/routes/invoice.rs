use actix_web::{Responder, get, post, web};
use api_gyms::services::permissions;
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
    dtos::invoice::{CreateInvoiceRequest, InvoiceFilter, InvoicesResponse, RecordPaymentRequest},
    services::invoice,
};

/// Lists a gym's invoices.
///
/// # Input
/// - `status` (query): optional `unpaid`, `partially_paid`, `paid`, `overdue` or `void`
///
/// # Output
/// - Success: `{ invoices: [...] }`
#[get("/{gym_id}/invoices")]
pub async fn get_invoices(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
    query: web::Query<InvoiceFilter>,
) -> Res<impl Responder> {
    let access = permissions::authorize(
        &pool,
        claims.user_id,
        path.into_inner(),
        &[GymPermission::PaymentsView, GymPermission::PaymentsManage],
    )
    .await?;
    let mut conn = pool.acquire().await?;
    let invoices =
        invoice::list_by_gym(&mut conn, access.gym.id, query.status, Utc::now().date_naive()).await?;
    Success::ok(InvoicesResponse { invoices })
}

/// Issues an invoice to a member.
///
/// # Input
/// - `memberId`: user id of the member
/// - `billableKind`: `subscription` or `service`; `billableId` optional
/// - `totalAmount`: minor currency units, positive
/// - `currency`: optional, defaults to the gym currency
/// - `dueDate`: `YYYY-MM-DD`
///
/// # Output
/// - Success: 201 with the invoice
///
/// # Frontend Example
/// ```javascript
/// await fetch(`/api/payments/${gymId}/invoices`, {
///   method: 'POST',
///   headers: {
///     'Content-Type': 'application/json',
///     'Authorization': `Bearer ${accessToken}`
///   },
///   body: JSON.stringify({
///     memberId,
///     billableKind: 'subscription',
///     totalAmount: 300000,
///     dueDate: '2025-04-01'
///   })
/// });
/// ```
#[post("/{gym_id}/invoices")]
pub async fn post_invoice(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<Uuid>,
    req: web::Json<CreateInvoiceRequest>,
) -> Res<impl Responder> {
    let access = permissions::authorize(
        &pool,
        claims.user_id,
        path.into_inner(),
        &[GymPermission::PaymentsManage],
    )
    .await?;
    let mut tx = pool.begin().await?;
    let created =
        invoice::create_invoice(&mut tx, &access.gym, req.into_inner(), Utc::now().date_naive()).await?;
    tx.commit().await?;
    Success::created(created)
}

/// Invoices of one member. Members may list their own.
#[get("/{gym_id}/members/{member_id}/invoices")]
pub async fn get_member_invoices(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<(Uuid, Uuid)>,
) -> Res<impl Responder> {
    let (gym_id, member_id) = path.into_inner();
    let access = permissions::authorize(&pool, claims.user_id, gym_id, &[]).await?;
    if member_id != claims.user_id
        && !access.can(GymPermission::PaymentsView)
        && !access.can(GymPermission::PaymentsManage)
    {
        return Err(AppError::coded(
            ErrorCode::InsufficientPermissions,
            "You do not have permission to view these invoices",
        ));
    }
    let mut conn = pool.acquire().await?;
    let invoices = invoice::list_by_member(&mut conn, gym_id, member_id, Utc::now().date_naive()).await?;
    Success::ok(InvoicesResponse { invoices })
}

/// Invoice with its payments, paid amount and balance.
#[get("/{gym_id}/invoices/{invoice_id}")]
pub async fn get_invoice(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<(Uuid, Uuid)>,
) -> Res<impl Responder> {
    let (gym_id, invoice_id) = path.into_inner();
    permissions::authorize(
        &pool,
        claims.user_id,
        gym_id,
        &[GymPermission::PaymentsView, GymPermission::PaymentsManage],
    )
    .await?;
    let mut tx = pool.begin().await?;
    let view = invoice::get_invoice(&mut tx, gym_id, invoice_id, Utc::now().date_naive()).await?;
    tx.commit().await?;
    Success::ok(view)
}

/// Records a payment against an invoice.
///
/// # Input
/// - `amount`: minor currency units, positive
/// - `method`: `cash`, `card`, `bank_transfer` or `online`
/// - `reference`: optional receipt or transaction number
///
/// # Output
/// - Success: the invoice view with its recomputed status
/// - Error: 400 on a void invoice
#[post("/{gym_id}/invoices/{invoice_id}/payments")]
pub async fn post_payment(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<(Uuid, Uuid)>,
    req: web::Json<RecordPaymentRequest>,
) -> Res<impl Responder> {
    let (gym_id, invoice_id) = path.into_inner();
    permissions::authorize(&pool, claims.user_id, gym_id, &[GymPermission::PaymentsManage]).await?;
    let mut tx = pool.begin().await?;
    let view = invoice::record_payment(
        &mut tx,
        gym_id,
        invoice_id,
        req.into_inner(),
        claims.user_id,
        Utc::now().date_naive(),
    )
    .await?;
    tx.commit().await?;
    Success::ok(view)
}

#[post("/{gym_id}/invoices/{invoice_id}/payments/{payment_id}/refund")]
pub async fn post_refund(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<(Uuid, Uuid, Uuid)>,
) -> Res<impl Responder> {
    let (gym_id, invoice_id, payment_id) = path.into_inner();
    permissions::authorize(&pool, claims.user_id, gym_id, &[GymPermission::PaymentsManage]).await?;
    let mut tx = pool.begin().await?;
    let view = invoice::refund_payment(&mut tx, gym_id, invoice_id, payment_id, Utc::now()).await?;
    tx.commit().await?;
    Success::ok(view)
}

/// Voids an invoice without payments.
///
/// # Output
/// - Error: 409 while non-refunded payments remain
#[post("/{gym_id}/invoices/{invoice_id}/void")]
pub async fn post_void(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    path: web::Path<(Uuid, Uuid)>,
) -> Res<impl Responder> {
    let (gym_id, invoice_id) = path.into_inner();
    permissions::authorize(&pool, claims.user_id, gym_id, &[GymPermission::PaymentsManage]).await?;
    let mut tx = pool.begin().await?;
    let voided = invoice::void_invoice(&mut tx, gym_id, invoice_id).await?;
    tx.commit().await?;
    Success::ok(voided)
}
