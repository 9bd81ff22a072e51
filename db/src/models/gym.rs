use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GymSettings {
    pub opening_hours: Option<String>,
    /// Members may check themselves in.
    pub allow_self_check_in: bool,
    /// Check-in also needs a running subscription, not just an active membership.
    pub require_active_subscription: bool,
    pub timezone: Option<String>,
}

impl Default for GymSettings {
    fn default() -> Self {
        Self {
            opening_hours: None,
            allow_self_check_in: false,
            require_active_subscription: true,
            timezone: None,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gym {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub slug: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub currency: String,
    pub settings: Json<GymSettings>,
    pub total_members: i32,
    pub active_members: i32,
    pub expired_members: i32,
    pub pending_members: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Member counters recalculated from the membership table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GymStats {
    pub total_members: i32,
    pub active_members: i32,
    pub expired_members: i32,
    pub pending_members: i32,
}
