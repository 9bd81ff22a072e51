use db::models::billing::{AppPlan, BillingCycle};
use serde::{Deserialize, Serialize};

use crate::services::blocker::BlockerConfig;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub plan_id: String,
    pub billing_cycle: BillingCycle,
    /// ISO currency code, defaults to DZD.
    pub currency: Option<String>,
    pub payment_method: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialRequest {
    pub plan_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DowngradeRequest {
    pub plan_id: String,
    pub billing_cycle: BillingCycle,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlansResponse {
    pub plans: Vec<AppPlan>,
}

#[derive(Debug, Serialize)]
pub struct BlockerResponse {
    pub blocker: Option<BlockerConfig>,
}
