use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    dtos::invoice::{InvoiceCreateRequest, PaymentCreateRequest},
    models::invoice::{Invoice, InvoiceStatus, PaymentTransaction},
};

pub async fn insert_invoice<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: InvoiceCreateRequest,
) -> Res<Invoice> {
    sqlx::query_as::<_, Invoice>(
        r#"
        INSERT INTO invoices
            (gym_id, member_id, billable_kind, billable_id, description, total_amount, currency, due_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(data.gym_id)
    .bind(data.member_id)
    .bind(data.billable_kind)
    .bind(data.billable_id)
    .bind(data.description)
    .bind(data.total_amount)
    .bind(data.currency)
    .bind(data.due_date)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn find_invoice<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    gym_id: Uuid,
    invoice_id: Uuid,
) -> Res<Option<Invoice>> {
    sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1 AND gym_id = $2")
        .bind(invoice_id)
        .bind(gym_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

/// Locks the invoice row for the rest of the transaction.
pub async fn lock_invoice<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    gym_id: Uuid,
    invoice_id: Uuid,
) -> Res<Option<Invoice>> {
    sqlx::query_as::<_, Invoice>(
        "SELECT * FROM invoices WHERE id = $1 AND gym_id = $2 FOR UPDATE",
    )
    .bind(invoice_id)
    .bind(gym_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_invoices_by_gym<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    gym_id: Uuid,
) -> Res<Vec<Invoice>> {
    sqlx::query_as::<_, Invoice>(
        "SELECT * FROM invoices WHERE gym_id = $1 ORDER BY due_date DESC, created_at DESC",
    )
    .bind(gym_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_invoices_by_member<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    gym_id: Uuid,
    member_id: Uuid,
) -> Res<Vec<Invoice>> {
    sqlx::query_as::<_, Invoice>(
        "SELECT * FROM invoices WHERE gym_id = $1 AND member_id = $2 ORDER BY due_date DESC",
    )
    .bind(gym_id)
    .bind(member_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn update_invoice_status<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    invoice_id: Uuid,
    status: InvoiceStatus,
) -> Res<Invoice> {
    sqlx::query_as::<_, Invoice>(
        "UPDATE invoices SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(invoice_id)
    .bind(status)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

// === PAYMENTS ===

pub async fn insert_payment<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: PaymentCreateRequest,
) -> Res<PaymentTransaction> {
    sqlx::query_as::<_, PaymentTransaction>(
        r#"
        INSERT INTO payment_transactions (invoice_id, amount, method, reference, recorded_by)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(data.invoice_id)
    .bind(data.amount)
    .bind(data.method)
    .bind(data.reference)
    .bind(data.recorded_by)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_payments<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    invoice_id: Uuid,
) -> Res<Vec<PaymentTransaction>> {
    sqlx::query_as::<_, PaymentTransaction>(
        "SELECT * FROM payment_transactions WHERE invoice_id = $1 ORDER BY paid_at",
    )
    .bind(invoice_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

/// Payments of several invoices at once, grouped by the caller.
pub async fn get_payments_for_invoices<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    invoice_ids: &[Uuid],
) -> Res<Vec<PaymentTransaction>> {
    sqlx::query_as::<_, PaymentTransaction>(
        "SELECT * FROM payment_transactions WHERE invoice_id = ANY($1) ORDER BY paid_at",
    )
    .bind(invoice_ids)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

/// Refunds a completed payment. `None` when it was already refunded or is unknown.
pub async fn refund_payment<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    invoice_id: Uuid,
    payment_id: Uuid,
    now: DateTime<Utc>,
) -> Res<Option<PaymentTransaction>> {
    sqlx::query_as::<_, PaymentTransaction>(
        r#"
        UPDATE payment_transactions SET status = 'refunded', refunded_at = $3
        WHERE id = $1 AND invoice_id = $2 AND status = 'completed'
        RETURNING *
        "#,
    )
    .bind(payment_id)
    .bind(invoice_id)
    .bind(now)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}
