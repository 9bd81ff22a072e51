use chrono::NaiveDate;
use db::models::invoice::{
    BillableKind, Invoice, InvoiceStatus, PaymentMethod, PaymentTransaction,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    /// User id of the member billed.
    pub member_id: Uuid,
    pub billable_kind: BillableKind,
    pub billable_id: Option<Uuid>,
    pub description: Option<String>,
    /// Minor currency units.
    pub total_amount: i64,
    /// Defaults to the gym currency.
    pub currency: Option<String>,
    pub due_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentRequest {
    pub amount: i64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceView {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub payments: Vec<PaymentTransaction>,
    pub paid_amount: i64,
    pub balance: i64,
}

#[derive(Debug, Serialize)]
pub struct InvoicesResponse {
    pub invoices: Vec<Invoice>,
}
