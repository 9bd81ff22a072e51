use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::billing::{
    AppSubscriptionStatus, AutoRenewType, BillingCycle, HistoryAction, TrialInfo,
};

pub struct AppSubscriptionCreateRequest {
    pub user_id: Uuid,
    pub plan_id: String,
    pub status: AppSubscriptionStatus,
    pub billing_cycle: BillingCycle,
    pub start_date: DateTime<Utc>,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub auto_renew: bool,
    pub auto_renew_type: AutoRenewType,
    pub payment_method: Option<String>,
    pub provider: Option<String>,
    pub trial: Option<TrialInfo>,
    pub last_payment_date: Option<DateTime<Utc>>,
    pub next_payment_date: Option<DateTime<Utc>>,
}

pub struct HistoryCreateRequest {
    pub user_id: Uuid,
    pub subscription_id: Uuid,
    pub plan_id: String,
    pub previous_plan_id: Option<String>,
    pub action: HistoryAction,
    pub status: AppSubscriptionStatus,
    pub billing_cycle: BillingCycle,
    pub amount_paid: i64,
    pub currency: Option<String>,
    pub details: Option<String>,
}
