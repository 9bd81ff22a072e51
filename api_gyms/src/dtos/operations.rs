use chrono::{DateTime, NaiveDate, Utc};
use db::models::operations::{AttendanceRecord, EquipmentCondition};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRequest {
    /// Member to check in. Defaults to the caller.
    pub user_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutRequest {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct AttendanceResponse {
    pub records: Vec<AttendanceRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClassRequest {
    pub name: String,
    pub description: Option<String>,
    pub coach_id: Option<Uuid>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub capacity: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentRequest {
    pub name: String,
    pub category: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(default = "default_condition")]
    pub condition: EquipmentCondition,
    pub purchased_at: Option<NaiveDate>,
    pub notes: Option<String>,
}

fn default_quantity() -> i32 {
    1
}

fn default_condition() -> EquipmentCondition {
    EquipmentCondition::Good
}
