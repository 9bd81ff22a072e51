use db::models::{
    gym::{Gym, GymSettings},
    membership::{DurationUnit, GymPermission},
};
use serde::{Deserialize, Serialize};

use crate::services::permissions::RolePermissions;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGymRequest {
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    /// ISO currency code, defaults to DZD.
    pub currency: Option<String>,
    pub settings: Option<GymSettings>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGymRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub settings: Option<GymSettings>,
}

#[derive(Debug, Serialize)]
pub struct GymsResponse {
    pub gyms: Vec<Gym>,
}

/// What the caller may do inside one gym.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyPermissionsResponse {
    pub is_owner: bool,
    pub role_permissions: RolePermissions,
    pub permissions: Vec<GymPermission>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionTypeRequest {
    pub name: String,
    pub description: Option<String>,
    pub duration: i32,
    pub unit: DurationUnit,
    /// Minor currency units.
    pub price: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubscriptionTypeRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
}
