use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "experience_level", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "program_purpose", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProgramPurpose {
    Strength,
    Hypertrophy,
    WeightLoss,
    Endurance,
    Mobility,
    GeneralFitness,
}

/// Who authored a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "creation_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CreationType {
    Member,
    Coach,
    Template,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub target_muscles: Vec<String>,
    #[serde(default)]
    pub equipment: Vec<String>,
    pub recommended_sets: Option<u32>,
    pub recommended_reps: Option<u32>,
    pub duration_minutes: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramDay {
    pub name: String,
    pub exercises: Vec<Exercise>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingProgram {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub experience: ExperienceLevel,
    pub purpose: ProgramPurpose,
    pub days_per_week: i32,
    pub duration_weeks: i32,
    pub days: Json<Vec<ProgramDay>>,
    pub creation_type: CreationType,
    pub is_public: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrainingProgram {
    /// Workouts needed to finish the program.
    pub fn total_days(&self) -> i32 {
        self.days_per_week.saturating_mul(self.duration_weeks)
    }

    /// Templates and public programs are visible to everyone, the rest only
    /// to their author.
    pub fn is_visible_to(&self, user_id: Uuid) -> bool {
        self.is_public
            || self.creation_type == CreationType::Template
            || self.created_by == Some(user_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "program_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProgramStatus {
    Active,
    Paused,
    Completed,
    Abandoned,
}

impl ProgramStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, ProgramStatus::Active | ProgramStatus::Paused)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseSet {
    pub reps: u32,
    #[serde(default)]
    pub weight: f64,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseProgress {
    pub exercise_name: String,
    pub sets: Vec<ExerciseSet>,
    pub notes: Option<String>,
}

/// One logged workout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayLog {
    pub day_name: String,
    pub date: NaiveDate,
    pub exercises: Vec<ExerciseProgress>,
    pub notes: Option<String>,
}

/// A user's run through a program.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramHistory {
    pub id: Uuid,
    pub user_id: Uuid,
    pub program_id: Uuid,
    pub program_name: String,
    /// Coach who assigned the program, `None` when the user started it.
    pub assigned_by: Option<Uuid>,
    pub status: ProgramStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub days_completed: i32,
    pub total_days: i32,
    pub day_logs: Json<Vec<DayLog>>,
    pub pauses_today: i32,
    pub last_pause_date: Option<NaiveDate>,
    pub last_workout_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "coach_request_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CoachRequestStatus {
    Pending,
    Accepted,
    Declined,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "request_initiator", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestInitiator {
    Member,
    Coach,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachRequest {
    pub id: Uuid,
    pub member_id: Uuid,
    pub coach_id: Uuid,
    pub initiated_by: RequestInitiator,
    pub message: Option<String>,
    pub status: CoachRequestStatus,
    pub response: Option<String>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CoachRequest {
    /// The party expected to answer: the coach for a member's request and
    /// the member for a coach's offer.
    pub fn recipient(&self) -> Uuid {
        match self.initiated_by {
            RequestInitiator::Member => self.coach_id,
            RequestInitiator::Coach => self.member_id,
        }
    }

    pub fn sender(&self) -> Uuid {
        match self.initiated_by {
            RequestInitiator::Member => self.member_id,
            RequestInitiator::Coach => self.coach_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "coaching_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CoachingStatus {
    Active,
    Ended,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachClient {
    pub id: Uuid,
    pub coach_id: Uuid,
    pub client_id: Uuid,
    pub request_id: Option<Uuid>,
    pub status: CoachingStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Active client with the profile fields and training state a coach sees.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachClientView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub relationship: CoachClient,
    pub full_name: String,
    pub username: Option<String>,
    pub email: String,
    pub current_program: Option<String>,
    pub last_workout_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "affiliation_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AffiliationStatus {
    Pending,
    Active,
    Declined,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "affiliation_initiator", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AffiliationInitiator {
    Gym,
    Coach,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliationPermissions {
    pub can_schedule_sessions: bool,
    pub can_access_facilities: bool,
}

impl Default for AffiliationPermissions {
    fn default() -> Self {
        Self {
            can_schedule_sessions: true,
            can_access_facilities: true,
        }
    }
}

/// A coach working with a gym.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GymCoachAffiliation {
    pub id: Uuid,
    pub gym_id: Uuid,
    pub coach_id: Uuid,
    pub status: AffiliationStatus,
    pub initiated_by: AffiliationInitiator,
    pub message: Option<String>,
    pub permissions: Json<AffiliationPermissions>,
    pub is_exclusive: bool,
    pub commission_rate: Option<f64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
