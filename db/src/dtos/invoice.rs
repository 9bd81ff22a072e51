use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::invoice::{BillableKind, PaymentMethod};

pub struct InvoiceCreateRequest {
    pub gym_id: Uuid,
    pub member_id: Uuid,
    pub billable_kind: BillableKind,
    pub billable_id: Option<Uuid>,
    pub description: Option<String>,
    pub total_amount: i64,
    pub currency: String,
    pub due_date: NaiveDate,
}

pub struct PaymentCreateRequest {
    pub invoice_id: Uuid,
    pub amount: i64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub recorded_by: Uuid,
}
