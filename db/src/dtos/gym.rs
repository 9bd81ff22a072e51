use uuid::Uuid;

use crate::models::{
    gym::GymSettings,
    membership::{
        CustomPermissions, DurationUnit, GymPermission, MembershipSettings, MembershipStatus,
        SubscriptionInfo,
    },
    user::UserRole,
};

pub struct GymCreateRequest {
    pub owner_id: Uuid,
    pub name: String,
    pub slug: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub currency: String,
    pub settings: GymSettings,
}

pub struct MembershipCreateRequest {
    pub user_id: Uuid,
    pub gym_id: Uuid,
    pub roles: Vec<UserRole>,
    pub status: MembershipStatus,
    pub subscription: Option<SubscriptionInfo>,
    pub custom_permissions: Option<CustomPermissions>,
    pub permissions: Vec<GymPermission>,
    pub settings: MembershipSettings,
}

pub struct SubscriptionTypeCreateRequest {
    pub gym_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub duration: i32,
    pub unit: DurationUnit,
    pub price: i64,
}
