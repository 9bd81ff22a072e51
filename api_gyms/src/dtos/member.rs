use chrono::NaiveDate;
use db::models::{
    membership::{CustomPermissions, GymMembership, GymPermission, MembershipStatus},
    user::{User, UserRole},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSubscriptionRequest {
    pub type_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    /// Preset such as `3_months`. Ignored when `typeId` is set.
    pub duration: Option<String>,
    pub payment_method: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMemberRequest {
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub subscription: Option<MemberSubscriptionRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: MembershipStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewRequest {
    pub type_id: Option<Uuid>,
    /// Defaults to the current end date while the subscription still runs,
    /// otherwise today.
    pub start_date: Option<NaiveDate>,
    pub duration: Option<String>,
    pub payment_method: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberFilter {
    pub status: Option<MembershipStatus>,
}

/// Membership joined with the member's user record.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    #[serde(flatten)]
    pub membership: GymMembership,
    pub user: Option<User>,
}

#[derive(Debug, Serialize)]
pub struct MembersResponse {
    pub members: Vec<MemberView>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddStaffRequest {
    pub email: String,
    pub full_name: Option<String>,
    pub roles: Vec<UserRole>,
    /// Explicit granular list. Role defaults apply when absent.
    pub permissions: Option<Vec<GymPermission>>,
    pub custom_permissions: Option<CustomPermissions>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStaffRequest {
    pub roles: Option<Vec<UserRole>>,
    pub permissions: Option<Vec<GymPermission>>,
    pub custom_permissions: Option<CustomPermissions>,
}
