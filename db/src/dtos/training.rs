use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::training::{
    AffiliationInitiator, AffiliationPermissions, CreationType, ExperienceLevel, ProgramDay,
    ProgramPurpose, RequestInitiator,
};

pub struct ProgramUpsertRequest {
    pub name: String,
    pub description: Option<String>,
    pub experience: ExperienceLevel,
    pub purpose: ProgramPurpose,
    pub days_per_week: i32,
    pub duration_weeks: i32,
    pub days: Vec<ProgramDay>,
    pub creation_type: CreationType,
    pub is_public: bool,
    pub created_by: Option<Uuid>,
}

pub struct ProgramHistoryCreateRequest {
    pub user_id: Uuid,
    pub program_id: Uuid,
    pub program_name: String,
    pub assigned_by: Option<Uuid>,
    pub start_date: DateTime<Utc>,
    pub total_days: i32,
}

pub struct ProgramFilter {
    pub creation_type: Option<CreationType>,
    pub created_by: Option<Uuid>,
    pub search: Option<String>,
    /// Caller; private programs of other users are hidden.
    pub viewer: Uuid,
}

pub struct CoachRequestCreateRequest {
    pub member_id: Uuid,
    pub coach_id: Uuid,
    pub initiated_by: RequestInitiator,
    pub message: Option<String>,
}

pub struct AffiliationCreateRequest {
    pub gym_id: Uuid,
    pub coach_id: Uuid,
    pub initiated_by: AffiliationInitiator,
    pub message: Option<String>,
    pub permissions: AffiliationPermissions,
    pub is_exclusive: bool,
    pub commission_rate: Option<f64>,
}
