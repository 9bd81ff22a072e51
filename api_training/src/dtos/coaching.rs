use db::models::training::AffiliationPermissions;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachRequestBody {
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondRequest {
    pub accept: bool,
    pub response: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignProgramRequest {
    pub program_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteCoachRequest {
    pub coach_id: Uuid,
    pub message: Option<String>,
    #[serde(default)]
    pub permissions: AffiliationPermissions,
    #[serde(default)]
    pub is_exclusive: bool,
    /// Percentage kept by the gym, 0 to 100.
    pub commission_rate: Option<f64>,
}
