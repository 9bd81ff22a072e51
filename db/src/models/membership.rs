use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

use super::user::UserRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "membership_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Active,
    Pending,
    Banned,
    Canceled,
    Expired,
}

/// Stored status of a member's gym subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberSubscriptionStatus {
    Active,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    pub type_id: Option<Uuid>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: MemberSubscriptionStatus,
    pub payment_method: Option<String>,
}

impl SubscriptionInfo {
    /// Status as seen at `today`: a cancellation always wins, otherwise a
    /// lapsed end date reads as expired.
    pub fn effective_status(&self, today: NaiveDate) -> MemberSubscriptionStatus {
        match self.status {
            MemberSubscriptionStatus::Cancelled => MemberSubscriptionStatus::Cancelled,
            _ if self.end_date < today => MemberSubscriptionStatus::Expired,
            status => status,
        }
    }
}

/// Partial override of the role permission table. `None` keeps the role value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomPermissions {
    pub can_manage_members: Option<bool>,
    pub can_manage_subscriptions: Option<bool>,
    pub can_manage_staff: Option<bool>,
    pub can_view_financials: Option<bool>,
    pub can_assign_programs: Option<bool>,
    pub can_manage_app_subscriptions: Option<bool>,
    pub can_customize_permissions: Option<bool>,
}

/// Fine grained gym permission, serialized as `"<area>:<action>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "gym_permission")]
pub enum GymPermission {
    #[serde(rename = "members:view")]
    #[sqlx(rename = "members:view")]
    MembersView,
    #[serde(rename = "members:create")]
    #[sqlx(rename = "members:create")]
    MembersCreate,
    #[serde(rename = "members:edit")]
    #[sqlx(rename = "members:edit")]
    MembersEdit,
    #[serde(rename = "members:delete")]
    #[sqlx(rename = "members:delete")]
    MembersDelete,
    #[serde(rename = "attendance:view")]
    #[sqlx(rename = "attendance:view")]
    AttendanceView,
    #[serde(rename = "attendance:checkin")]
    #[sqlx(rename = "attendance:checkin")]
    AttendanceCheckin,
    #[serde(rename = "attendance:manage")]
    #[sqlx(rename = "attendance:manage")]
    AttendanceManage,
    #[serde(rename = "pricing:view")]
    #[sqlx(rename = "pricing:view")]
    PricingView,
    #[serde(rename = "pricing:manage")]
    #[sqlx(rename = "pricing:manage")]
    PricingManage,
    #[serde(rename = "staff:view")]
    #[sqlx(rename = "staff:view")]
    StaffView,
    #[serde(rename = "staff:manage")]
    #[sqlx(rename = "staff:manage")]
    StaffManage,
    #[serde(rename = "settings:view")]
    #[sqlx(rename = "settings:view")]
    SettingsView,
    #[serde(rename = "settings:manage")]
    #[sqlx(rename = "settings:manage")]
    SettingsManage,
    #[serde(rename = "analytics:view")]
    #[sqlx(rename = "analytics:view")]
    AnalyticsView,
    #[serde(rename = "analytics:export")]
    #[sqlx(rename = "analytics:export")]
    AnalyticsExport,
    #[serde(rename = "schedules:view")]
    #[sqlx(rename = "schedules:view")]
    SchedulesView,
    #[serde(rename = "schedules:manage")]
    #[sqlx(rename = "schedules:manage")]
    SchedulesManage,
    #[serde(rename = "clients:view")]
    #[sqlx(rename = "clients:view")]
    ClientsView,
    #[serde(rename = "clients:manage")]
    #[sqlx(rename = "clients:manage")]
    ClientsManage,
    #[serde(rename = "payments:view")]
    #[sqlx(rename = "payments:view")]
    PaymentsView,
    #[serde(rename = "payments:manage")]
    #[sqlx(rename = "payments:manage")]
    PaymentsManage,
}

impl GymPermission {
    pub const ALL: [GymPermission; 21] = [
        GymPermission::MembersView,
        GymPermission::MembersCreate,
        GymPermission::MembersEdit,
        GymPermission::MembersDelete,
        GymPermission::AttendanceView,
        GymPermission::AttendanceCheckin,
        GymPermission::AttendanceManage,
        GymPermission::PricingView,
        GymPermission::PricingManage,
        GymPermission::StaffView,
        GymPermission::StaffManage,
        GymPermission::SettingsView,
        GymPermission::SettingsManage,
        GymPermission::AnalyticsView,
        GymPermission::AnalyticsExport,
        GymPermission::SchedulesView,
        GymPermission::SchedulesManage,
        GymPermission::ClientsView,
        GymPermission::ClientsManage,
        GymPermission::PaymentsView,
        GymPermission::PaymentsManage,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    Kg,
    Lbs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MembershipSettings {
    pub weight_unit: WeightUnit,
    pub class_reminders: bool,
    pub subscription_renewal: bool,
    pub announcements: bool,
    pub public_profile: bool,
    pub share_progress_with_coaches: bool,
}

impl Default for MembershipSettings {
    fn default() -> Self {
        Self {
            weight_unit: WeightUnit::Kg,
            class_reminders: true,
            subscription_renewal: true,
            announcements: true,
            public_profile: false,
            share_progress_with_coaches: true,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GymMembership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub gym_id: Uuid,
    pub roles: Vec<UserRole>,
    pub joined_at: DateTime<Utc>,
    pub status: MembershipStatus,
    pub subscription: Option<Json<SubscriptionInfo>>,
    pub custom_permissions: Option<Json<CustomPermissions>>,
    pub permissions: Vec<GymPermission>,
    pub settings: Json<MembershipSettings>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GymMembership {
    pub fn has_role(&self, role: UserRole) -> bool {
        self.roles.contains(&role)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "duration_unit", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DurationUnit {
    Day,
    Week,
    Month,
    Year,
}

/// Pricing tier a gym sells to its members.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionType {
    pub id: Uuid,
    pub gym_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub duration: i32,
    pub unit: DurationUnit,
    pub price: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
