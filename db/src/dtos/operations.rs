use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::models::operations::{AttendanceStatus, EquipmentCondition};

pub struct AttendanceCreateRequest {
    pub gym_id: Uuid,
    pub user_id: Uuid,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
}

pub struct ClassCreateRequest {
    pub gym_id: Uuid,
    pub coach_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub capacity: i32,
}

pub struct EquipmentUpsertRequest {
    pub name: String,
    pub category: Option<String>,
    pub quantity: i32,
    pub condition: EquipmentCondition,
    pub purchased_at: Option<NaiveDate>,
    pub notes: Option<String>,
}
