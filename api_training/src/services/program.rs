use common::error::{AppError, ErrorCode, Res};
use db::{
    dtos::training::{ProgramFilter, ProgramUpsertRequest},
    models::{
        training::{CreationType, TrainingProgram},
        user::{User, UserRole},
    },
};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::dtos::training::{ProgramQuery, ProgramRequest};

pub const MAX_DURATION_WEEKS: i32 = 104;

pub fn validate_program(req: &ProgramRequest) -> Res<()> {
    if req.name.trim().is_empty() {
        return Err(AppError::coded(ErrorCode::ValidationError, "Program name is required"));
    }
    if !(1..=7).contains(&req.days_per_week) {
        return Err(AppError::coded(
            ErrorCode::ValidationError,
            "Days per week must be between 1 and 7",
        ));
    }
    if !(1..=MAX_DURATION_WEEKS).contains(&req.duration_weeks) {
        return Err(AppError::coded(
            ErrorCode::ValidationError,
            format!("Duration must be between 1 and {} weeks", MAX_DURATION_WEEKS),
        ));
    }
    if req.days.is_empty() {
        return Err(AppError::coded(ErrorCode::ValidationError, "A program needs at least one day"));
    }
    if req.days.iter().any(|d| d.name.trim().is_empty()) {
        return Err(AppError::coded(ErrorCode::ValidationError, "Every day needs a name"));
    }
    Ok(())
}

/// Coaches publish coach programs, everyone else member programs.
pub fn creation_type_for(author: &User) -> CreationType {
    match author.role {
        UserRole::Coach => CreationType::Coach,
        _ => CreationType::Member,
    }
}

fn upsert_request(req: ProgramRequest, creation_type: CreationType, author: Uuid) -> ProgramUpsertRequest {
    ProgramUpsertRequest {
        name: req.name.trim().to_string(),
        description: req.description,
        experience: req.experience,
        purpose: req.purpose,
        days_per_week: req.days_per_week,
        duration_weeks: req.duration_weeks,
        days: req.days,
        creation_type,
        is_public: req.is_public,
        created_by: Some(author),
    }
}

pub async fn create_program(
    conn: &mut PgConnection,
    user_id: Uuid,
    req: ProgramRequest,
) -> Res<TrainingProgram> {
    validate_program(&req)?;
    let author = db::user::get_user_by_id(&mut *conn, user_id).await?;
    let program = db::training::insert_program(
        &mut *conn,
        upsert_request(req, creation_type_for(&author), user_id),
    )
    .await?;
    log::info!("Program {} created by {}", program.id, user_id);
    Ok(program)
}

/// A program the caller can see. Hidden programs read as missing.
pub async fn visible_program(
    conn: &mut PgConnection,
    user_id: Uuid,
    program_id: Uuid,
) -> Res<TrainingProgram> {
    db::training::find_program(&mut *conn, program_id)
        .await?
        .filter(|p| p.is_visible_to(user_id))
        .ok_or_else(|| AppError::coded(ErrorCode::ProgramNotFound, "Program not found"))
}

/// Only the author may edit. Templates have no author and stay read-only.
pub async fn update_program(
    conn: &mut PgConnection,
    user_id: Uuid,
    program_id: Uuid,
    req: ProgramRequest,
) -> Res<TrainingProgram> {
    validate_program(&req)?;
    let program = visible_program(conn, user_id, program_id).await?;
    if program.created_by != Some(user_id) {
        return Err(AppError::Forbidden("Only the author can edit this program".to_string()));
    }
    db::training::update_program(
        &mut *conn,
        program_id,
        upsert_request(req, program.creation_type, user_id),
    )
    .await
}

pub async fn list_programs(
    conn: &mut PgConnection,
    user_id: Uuid,
    query: ProgramQuery,
) -> Res<Vec<TrainingProgram>> {
    db::training::get_programs(
        &mut *conn,
        ProgramFilter {
            creation_type: query.creation_type,
            created_by: query.mine.then_some(user_id),
            search: query.search.filter(|s| !s.trim().is_empty()),
            viewer: user_id,
        },
    )
    .await
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;
    use db::models::training::{Exercise, ExperienceLevel, ProgramDay, ProgramPurpose};
    use sqlx::types::Json;

    fn request(days_per_week: i32, duration_weeks: i32) -> ProgramRequest {
        ProgramRequest {
            name: "Push Pull Legs".to_string(),
            description: None,
            experience: ExperienceLevel::Intermediate,
            purpose: ProgramPurpose::Hypertrophy,
            days_per_week,
            duration_weeks,
            days: vec![ProgramDay {
                name: "Push".to_string(),
                exercises: vec![Exercise {
                    name: "Bench press".to_string(),
                    recommended_sets: Some(4),
                    ..Default::default()
                }],
            }],
            is_public: false,
        }
    }

    pub(crate) fn program(created_by: Option<Uuid>, creation_type: CreationType, is_public: bool) -> TrainingProgram {
        let now = Utc::now();
        TrainingProgram {
            id: Uuid::new_v4(),
            name: "Starter".to_string(),
            description: None,
            experience: ExperienceLevel::Beginner,
            purpose: ProgramPurpose::GeneralFitness,
            days_per_week: 3,
            duration_weeks: 4,
            days: Json(vec![]),
            creation_type,
            is_public,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn accepts_a_reasonable_program() {
        assert!(validate_program(&request(3, 12)).is_ok());
    }

    #[test]
    fn rejects_out_of_range_schedules() {
        assert!(validate_program(&request(0, 12)).is_err());
        assert!(validate_program(&request(8, 12)).is_err());
        assert!(validate_program(&request(3, 0)).is_err());
        assert_eq!(
            validate_program(&request(3, MAX_DURATION_WEEKS + 1)).unwrap_err().code(),
            ErrorCode::ValidationError
        );

        let mut empty = request(3, 12);
        empty.days.clear();
        assert!(validate_program(&empty).is_err());
    }

    #[test]
    fn visibility_follows_author_and_flags() {
        let author = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        let private = program(Some(author), CreationType::Member, false);
        assert!(private.is_visible_to(author));
        assert!(!private.is_visible_to(stranger));

        assert!(program(Some(author), CreationType::Coach, true).is_visible_to(stranger));
        assert!(program(None, CreationType::Template, false).is_visible_to(stranger));
        assert_eq!(private.total_days(), 12);
    }
}
