use chrono::NaiveDate;
use db::models::training::{
    CreationType, ExerciseProgress, ExperienceLevel, ProgramDay, ProgramPurpose,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramRequest {
    pub name: String,
    pub description: Option<String>,
    pub experience: ExperienceLevel,
    pub purpose: ProgramPurpose,
    pub days_per_week: i32,
    #[serde(default = "default_duration_weeks")]
    pub duration_weeks: i32,
    pub days: Vec<ProgramDay>,
    #[serde(default)]
    pub is_public: bool,
}

fn default_duration_weeks() -> i32 {
    12
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramQuery {
    pub creation_type: Option<CreationType>,
    /// Only programs the caller wrote.
    #[serde(default)]
    pub mine: bool,
    pub search: Option<String>,
}

/// One completed workout.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub day_name: String,
    /// Defaults to today (UTC).
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub exercises: Vec<ExerciseProgress>,
    pub notes: Option<String>,
}
