//! Member invoices. Every payment mutation locks the invoice row, then
//! recomputes and stores its status.

use chrono::{DateTime, NaiveDate, Utc};
use common::error::{AppError, ErrorCode, Res};
use db::{
    dtos::invoice::{InvoiceCreateRequest, PaymentCreateRequest},
    models::{
        gym::Gym,
        invoice::{Invoice, InvoiceStatus, PaymentTransaction},
    },
};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    dtos::invoice::{CreateInvoiceRequest, InvoiceView, RecordPaymentRequest},
    services::status,
};

fn not_found() -> AppError {
    AppError::coded(ErrorCode::InvoiceNotFound, "Invoice not found")
}

async fn lock(conn: &mut PgConnection, gym_id: Uuid, invoice_id: Uuid) -> Res<Invoice> {
    db::invoice::lock_invoice(&mut *conn, gym_id, invoice_id)
        .await?
        .ok_or_else(not_found)
}

/// Recomputes the status from the stored payments and persists it when it
/// changed.
async fn sync_status(conn: &mut PgConnection, invoice: Invoice, today: NaiveDate) -> Res<InvoiceView> {
    let payments = db::invoice::get_payments(&mut *conn, invoice.id).await?;
    let computed = status::compute_invoice_status(
        invoice.total_amount,
        &payments,
        invoice.due_date,
        today,
        invoice.status == InvoiceStatus::Void,
    );

    let invoice = if computed != invoice.status {
        db::invoice::update_invoice_status(&mut *conn, invoice.id, computed).await?
    } else {
        invoice
    };
    Ok(view(invoice, payments))
}

fn view(invoice: Invoice, payments: Vec<PaymentTransaction>) -> InvoiceView {
    let paid_amount = status::paid_amount(&payments);
    InvoiceView {
        balance: (invoice.total_amount - paid_amount).max(0),
        invoice,
        payments,
        paid_amount,
    }
}

pub async fn create_invoice(
    conn: &mut PgConnection,
    gym: &Gym,
    req: CreateInvoiceRequest,
    today: NaiveDate,
) -> Res<Invoice> {
    if req.total_amount <= 0 {
        return Err(AppError::coded(ErrorCode::ValidationError, "Total amount must be positive"));
    }
    if db::membership::find_membership(&mut *conn, gym.id, req.member_id).await?.is_none() {
        return Err(AppError::coded(ErrorCode::MemberNotFound, "Member not found in this gym"));
    }

    let invoice = db::invoice::insert_invoice(
        &mut *conn,
        InvoiceCreateRequest {
            gym_id: gym.id,
            member_id: req.member_id,
            billable_kind: req.billable_kind,
            billable_id: req.billable_id,
            description: req.description,
            total_amount: req.total_amount,
            currency: req
                .currency
                .map(|c| c.to_uppercase())
                .unwrap_or_else(|| gym.currency.clone()),
            due_date: req.due_date,
        },
    )
    .await?;

    log::info!("Invoice {} issued to {} at gym {}", invoice.id, invoice.member_id, gym.id);
    Ok(sync_status(conn, invoice, today).await?.invoice)
}

pub async fn get_invoice(
    conn: &mut PgConnection,
    gym_id: Uuid,
    invoice_id: Uuid,
    today: NaiveDate,
) -> Res<InvoiceView> {
    let invoice = lock(conn, gym_id, invoice_id).await?;
    sync_status(conn, invoice, today).await
}

pub async fn record_payment(
    conn: &mut PgConnection,
    gym_id: Uuid,
    invoice_id: Uuid,
    req: RecordPaymentRequest,
    recorded_by: Uuid,
    today: NaiveDate,
) -> Res<InvoiceView> {
    if req.amount <= 0 {
        return Err(AppError::coded(ErrorCode::ValidationError, "Payment amount must be positive"));
    }

    let invoice = lock(conn, gym_id, invoice_id).await?;
    if invoice.status == InvoiceStatus::Void {
        return Err(AppError::BadRequest("Cannot record a payment on a void invoice".to_string()));
    }

    let payment = db::invoice::insert_payment(
        &mut *conn,
        PaymentCreateRequest {
            invoice_id: invoice.id,
            amount: req.amount,
            method: req.method,
            reference: req.reference,
            recorded_by,
        },
    )
    .await?;
    log::info!("Payment {} of {} recorded on invoice {}", payment.id, payment.amount, invoice.id);

    sync_status(conn, invoice, today).await
}

pub async fn refund_payment(
    conn: &mut PgConnection,
    gym_id: Uuid,
    invoice_id: Uuid,
    payment_id: Uuid,
    now: DateTime<Utc>,
) -> Res<InvoiceView> {
    let invoice = lock(conn, gym_id, invoice_id).await?;
    db::invoice::refund_payment(&mut *conn, invoice.id, payment_id, now)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found or already refunded".to_string()))?;
    sync_status(conn, invoice, now.date_naive()).await
}

/// Voids an invoice. Payments must be refunded first.
pub async fn void_invoice(
    conn: &mut PgConnection,
    gym_id: Uuid,
    invoice_id: Uuid,
) -> Res<Invoice> {
    let invoice = lock(conn, gym_id, invoice_id).await?;
    if invoice.status == InvoiceStatus::Void {
        return Ok(invoice);
    }
    let payments = db::invoice::get_payments(&mut *conn, invoice.id).await?;
    if status::paid_amount(&payments) > 0 {
        return Err(AppError::Conflict(
            "Refund the payments before voiding this invoice".to_string(),
        ));
    }
    db::invoice::update_invoice_status(&mut *conn, invoice.id, InvoiceStatus::Void).await
}

/// Brings the stored statuses of `invoices` up to date.
async fn refresh_listed(conn: &mut PgConnection, invoices: Vec<Invoice>, today: NaiveDate) -> Res<Vec<Invoice>> {
    let ids: Vec<Uuid> = invoices.iter().map(|i| i.id).collect();
    let payments = db::invoice::get_payments_for_invoices(&mut *conn, &ids).await?;
    let (invoices, stale) = status::refresh_statuses(invoices, &payments, today);
    for (invoice_id, computed) in stale {
        db::invoice::update_invoice_status(&mut *conn, invoice_id, computed).await?;
    }
    Ok(invoices)
}

/// The status filter applies to the recomputed status, so an unpaid invoice
/// past its due date lists as overdue.
pub async fn list_by_gym(
    conn: &mut PgConnection,
    gym_id: Uuid,
    status: Option<InvoiceStatus>,
    today: NaiveDate,
) -> Res<Vec<Invoice>> {
    let invoices = db::invoice::get_invoices_by_gym(&mut *conn, gym_id).await?;
    let invoices = refresh_listed(conn, invoices, today).await?;
    Ok(invoices
        .into_iter()
        .filter(|i| status.is_none_or(|s| i.status == s))
        .collect())
}

pub async fn list_by_member(
    conn: &mut PgConnection,
    gym_id: Uuid,
    member_id: Uuid,
    today: NaiveDate,
) -> Res<Vec<Invoice>> {
    let invoices = db::invoice::get_invoices_by_member(&mut *conn, gym_id, member_id).await?;
    refresh_listed(conn, invoices, today).await
}
