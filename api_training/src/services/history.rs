//! A user's runs through training programs.
//!
//! At most one run is open (active or paused) per user. Starting another
//! program abandons the open one. Transitions are plain functions over a
//! locked row; the async wrappers load, apply and save.

use chrono::{DateTime, NaiveDate, Utc};
use common::error::{AppError, ErrorCode, Res};
use db::{
    dtos::training::ProgramHistoryCreateRequest,
    models::training::{DayLog, ProgramHistory, ProgramStatus, TrainingProgram},
};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{dtos::training::SessionRequest, services::program};

/// Pauses allowed per UTC day.
pub const MAX_DAILY_PAUSES: i32 = 3;

pub fn new_run(
    program: &TrainingProgram,
    user_id: Uuid,
    assigned_by: Option<Uuid>,
    now: DateTime<Utc>,
) -> ProgramHistoryCreateRequest {
    ProgramHistoryCreateRequest {
        user_id,
        program_id: program.id,
        program_name: program.name.clone(),
        assigned_by,
        start_date: now,
        total_days: program.total_days().max(1),
    }
}

fn no_active_program() -> AppError {
    AppError::coded(ErrorCode::NoActiveProgram, "No active program")
}

pub fn abandon(history: &mut ProgramHistory, now: DateTime<Utc>) -> Res<()> {
    if !history.status.is_open() {
        return Err(no_active_program());
    }
    history.status = ProgramStatus::Abandoned;
    history.end_date = Some(now);
    Ok(())
}

/// The counter restarts on the first pause of a new day.
pub fn pause(history: &mut ProgramHistory, today: NaiveDate) -> Res<()> {
    match history.status {
        ProgramStatus::Active => {}
        ProgramStatus::Paused => {
            return Err(AppError::BadRequest("Program is already paused".to_string()));
        }
        _ => return Err(no_active_program()),
    }
    if history.last_pause_date != Some(today) {
        history.pauses_today = 0;
    }
    if history.pauses_today >= MAX_DAILY_PAUSES {
        return Err(AppError::coded(
            ErrorCode::ProgramPauseLimitExceeded,
            format!("A program can be paused at most {} times a day", MAX_DAILY_PAUSES),
        ));
    }
    history.status = ProgramStatus::Paused;
    history.pauses_today += 1;
    history.last_pause_date = Some(today);
    Ok(())
}

pub fn resume(history: &mut ProgramHistory) -> Res<()> {
    match history.status {
        ProgramStatus::Paused => {
            history.status = ProgramStatus::Active;
            Ok(())
        }
        ProgramStatus::Active => Err(AppError::BadRequest("Program is not paused".to_string())),
        _ => Err(no_active_program()),
    }
}

/// Appends a workout. Reaching `total_days` completes the run.
pub fn record_session(history: &mut ProgramHistory, log: DayLog, now: DateTime<Utc>) -> Res<()> {
    match history.status {
        ProgramStatus::Active => {}
        ProgramStatus::Paused => {
            return Err(AppError::BadRequest("Resume the program before logging a workout".to_string()));
        }
        _ => return Err(no_active_program()),
    }
    history.day_logs.0.push(log);
    history.days_completed += 1;
    history.last_workout_at = Some(now);
    if history.days_completed >= history.total_days {
        history.status = ProgramStatus::Completed;
        history.end_date = Some(now);
    }
    Ok(())
}

/// Opens a new run, abandoning whatever was open.
pub async fn start(
    conn: &mut PgConnection,
    user_id: Uuid,
    program: &TrainingProgram,
    assigned_by: Option<Uuid>,
    now: DateTime<Utc>,
) -> Res<ProgramHistory> {
    if let Some(mut open) = db::training::lock_open_history(&mut *conn, user_id).await? {
        abandon(&mut open, now)?;
        db::training::save_history(&mut *conn, &open).await?;
        log::info!("Program run {} abandoned for user {}", open.id, user_id);
    }
    db::training::insert_history(&mut *conn, new_run(program, user_id, assigned_by, now)).await
}

pub async fn start_own(
    conn: &mut PgConnection,
    user_id: Uuid,
    program_id: Uuid,
    now: DateTime<Utc>,
) -> Res<ProgramHistory> {
    let program = program::visible_program(conn, user_id, program_id).await?;
    start(conn, user_id, &program, None, now).await
}

pub async fn active(conn: &mut PgConnection, user_id: Uuid) -> Res<ProgramHistory> {
    db::training::lock_open_history(&mut *conn, user_id)
        .await?
        .ok_or_else(no_active_program)
}

pub async fn pause_active(conn: &mut PgConnection, user_id: Uuid, now: DateTime<Utc>) -> Res<ProgramHistory> {
    let mut history = active(conn, user_id).await?;
    pause(&mut history, now.date_naive())?;
    db::training::save_history(&mut *conn, &history).await
}

pub async fn resume_active(conn: &mut PgConnection, user_id: Uuid) -> Res<ProgramHistory> {
    let mut history = active(conn, user_id).await?;
    resume(&mut history)?;
    db::training::save_history(&mut *conn, &history).await
}

pub async fn log_session(
    conn: &mut PgConnection,
    user_id: Uuid,
    req: SessionRequest,
    now: DateTime<Utc>,
) -> Res<ProgramHistory> {
    if req.day_name.trim().is_empty() {
        return Err(AppError::coded(ErrorCode::ValidationError, "Day name is required"));
    }
    let mut history = active(conn, user_id).await?;
    let log = DayLog {
        day_name: req.day_name.trim().to_string(),
        date: req.date.unwrap_or_else(|| now.date_naive()),
        exercises: req.exercises,
        notes: req.notes,
    };
    record_session(&mut history, log, now)?;
    if history.status == ProgramStatus::Completed {
        log::info!("User {} completed program {}", user_id, history.program_id);
    }
    db::training::save_history(&mut *conn, &history).await
}

pub async fn runs(conn: &mut PgConnection, user_id: Uuid) -> Res<Vec<ProgramHistory>> {
    db::training::get_histories(&mut *conn, user_id).await
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use db::models::training::CreationType;
    use sqlx::types::Json;

    pub(crate) fn history(total_days: i32, assigned_by: Option<Uuid>) -> ProgramHistory {
        let now = Utc.with_ymd_and_hms(2025, 5, 1, 7, 0, 0).unwrap();
        ProgramHistory {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            program_id: Uuid::new_v4(),
            program_name: "Starter".to_string(),
            assigned_by,
            status: ProgramStatus::Active,
            start_date: now,
            end_date: None,
            days_completed: 0,
            total_days,
            day_logs: Json(vec![]),
            pauses_today: 0,
            last_pause_date: None,
            last_workout_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn day(name: &str) -> DayLog {
        DayLog {
            day_name: name.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 5, 2).unwrap(),
            exercises: vec![],
            notes: None,
        }
    }

    #[test]
    fn sessions_accumulate_then_complete() {
        let now = Utc.with_ymd_and_hms(2025, 5, 2, 18, 0, 0).unwrap();
        let mut run = history(2, None);

        record_session(&mut run, day("Push"), now).unwrap();
        assert_eq!(run.status, ProgramStatus::Active);
        assert_eq!(run.days_completed, 1);
        assert_eq!(run.last_workout_at, Some(now));
        assert!(run.end_date.is_none());

        record_session(&mut run, day("Pull"), now).unwrap();
        assert_eq!(run.status, ProgramStatus::Completed);
        assert_eq!(run.end_date, Some(now));
        assert_eq!(run.day_logs.0.len(), 2);

        let err = record_session(&mut run, day("Legs"), now).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoActiveProgram);
    }

    #[test]
    fn paused_runs_do_not_take_sessions() {
        let now = Utc.with_ymd_and_hms(2025, 5, 2, 18, 0, 0).unwrap();
        let mut run = history(10, None);
        pause(&mut run, now.date_naive()).unwrap();
        assert!(record_session(&mut run, day("Push"), now).is_err());
        assert_eq!(run.days_completed, 0);

        resume(&mut run).unwrap();
        assert!(record_session(&mut run, day("Push"), now).is_ok());
    }

    #[test]
    fn pause_limit_resets_each_day() {
        let monday = NaiveDate::from_ymd_opt(2025, 5, 5).unwrap();
        let mut run = history(10, None);
        for _ in 0..MAX_DAILY_PAUSES {
            pause(&mut run, monday).unwrap();
            resume(&mut run).unwrap();
        }
        let err = pause(&mut run, monday).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ProgramPauseLimitExceeded);
        assert_eq!(run.status, ProgramStatus::Active);

        let tuesday = monday.succ_opt().unwrap();
        pause(&mut run, tuesday).unwrap();
        assert_eq!(run.pauses_today, 1);
        assert_eq!(run.last_pause_date, Some(tuesday));
    }

    #[test]
    fn pause_and_resume_reject_wrong_states() {
        let today = NaiveDate::from_ymd_opt(2025, 5, 5).unwrap();
        let mut run = history(10, None);
        assert!(resume(&mut run).is_err());
        pause(&mut run, today).unwrap();
        assert!(pause(&mut run, today).is_err());

        run.status = ProgramStatus::Completed;
        assert_eq!(resume(&mut run).unwrap_err().code(), ErrorCode::NoActiveProgram);
    }

    #[test]
    fn abandon_closes_open_runs_only() {
        let now = Utc.with_ymd_and_hms(2025, 5, 9, 9, 0, 0).unwrap();
        let mut run = history(10, None);
        abandon(&mut run, now).unwrap();
        assert_eq!(run.status, ProgramStatus::Abandoned);
        assert_eq!(run.end_date, Some(now));
        assert!(abandon(&mut run, now).is_err());
    }

    #[test]
    fn new_run_sizes_from_program() {
        let now = Utc.with_ymd_and_hms(2025, 5, 9, 9, 0, 0).unwrap();
        let coach = Uuid::new_v4();
        let program = program::tests::program(Some(coach), CreationType::Coach, true);
        let user = Uuid::new_v4();
        let run = new_run(&program, user, Some(coach), now);
        assert_eq!(run.total_days, 12);
        assert_eq!(run.assigned_by, Some(coach));
        assert_eq!(run.program_name, "Starter");
        assert_eq!(run.start_date, now);
    }
}
