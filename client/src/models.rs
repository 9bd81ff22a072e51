//! Response shapes as the client sees them. Fields the client does not use
//! are ignored when decoding.

use chrono::{DateTime, Utc};
use db::models::{
    billing::{AppPlan, AppSubscription, BillingCycle},
    gym::Gym,
    invoice::Invoice,
    membership::GymMembership,
    user::User,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    pub user: User,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub status: String,
    pub reason: Option<String>,
    pub expiry_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MySubscription {
    pub subscription: AppSubscription,
    pub plan: AppPlan,
    pub resolution: Resolution,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeOutcome {
    pub subscription: AppSubscription,
    pub amount_paid: i64,
    pub proration_credit: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blocker {
    pub show: bool,
    #[serde(rename = "type")]
    pub modal_type: String,
    pub reason: String,
    pub expiry_date: DateTime<Utc>,
    pub can_dismiss: bool,
    pub title_key: String,
    pub message_key: String,
    pub severity: String,
    pub show_countdown: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BlockerEnvelope {
    pub blocker: Option<Blocker>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GymsPage {
    pub gyms: Vec<Gym>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    #[serde(flatten)]
    pub membership: GymMembership,
    pub user: Option<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MembersPage {
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct InvoicesPage {
    pub invoices: Vec<Invoice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub region: String,
    pub region_name: String,
    pub currency: String,
    pub timezone: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginBody<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeBody {
    pub plan_id: String,
    pub billing_cycle: BillingCycle,
    pub currency: Option<String>,
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DowngradeBody {
    pub plan_id: String,
    pub billing_cycle: BillingCycle,
}

#[derive(Debug, Serialize)]
pub(crate) struct CancelBody<'a> {
    pub reason: Option<&'a str>,
}
