use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

/// Plan tier. Ordering follows upgrade direction: free < starter < pro < premium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "plan_level", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanLevel {
    Free,
    Starter,
    Pro,
    Premium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "plan_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    Subscription,
    OneTime,
}

/// Billing cycle. Ordering is used to tell a cycle switch up from a switch down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "billing_cycle", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Monthly,
    Yearly,
    OneTime,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanPrice {
    pub monthly: Option<i64>,
    pub yearly: Option<i64>,
    pub one_time: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanLimits {
    pub max_gyms: Option<i32>,
    pub max_members: Option<i32>,
    pub max_gems: Option<i32>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppPlan {
    pub plan_id: String,
    pub version: i32,
    pub level: PlanLevel,
    pub plan_order: i32,
    pub name: String,
    pub description: String,
    pub plan_type: PlanType,
    /// Prices in minor units keyed by ISO currency code.
    pub pricing: Json<HashMap<String, PlanPrice>>,
    pub limits: Json<PlanLimits>,
    pub features: Vec<String>,
    pub trial_days: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "app_subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AppSubscriptionStatus {
    Active,
    Trialing,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "auto_renew_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AutoRenewType {
    Auto,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialInfo {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub has_used_trial: bool,
    pub converted_to_paid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftGracePeriod {
    pub start_date: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: String,
    pub status: AppSubscriptionStatus,
    pub billing_cycle: BillingCycle,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub auto_renew: bool,
    pub auto_renew_type: AutoRenewType,
    pub payment_method: Option<String>,
    pub provider: Option<String>,
    pub provider_subscription_id: Option<String>,
    pub trial: Option<Json<TrialInfo>>,
    pub soft_grace_period: Option<Json<SoftGracePeriod>>,
    pub cancel_at_period_end: bool,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub pending_plan_id: Option<String>,
    pub pending_billing_cycle: Option<BillingCycle>,
    pub pending_change_effective_date: Option<DateTime<Utc>>,
    pub last_payment_date: Option<DateTime<Utc>>,
    pub next_payment_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AppSubscription {
    pub fn trial(&self) -> Option<&TrialInfo> {
        self.trial.as_ref().map(|t| &t.0)
    }

    pub fn soft_grace(&self) -> Option<&SoftGracePeriod> {
        self.soft_grace_period.as_ref().map(|g| &g.0)
    }

    pub fn has_pending_change(&self) -> bool {
        self.pending_plan_id.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "history_action", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Created,
    Upgraded,
    Downgraded,
    Renewed,
    Cancelled,
    Expired,
    Reactivated,
    TrialStarted,
    TrialConverted,
    DowngradeScheduled,
    SwitchScheduled,
    PendingChangeCancelled,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSubscriptionHistory {
    pub id: Uuid,
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
    pub created_at: DateTime<Utc>,
}
