use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use sqlx::{Executor, Postgres, types::Json};
use uuid::Uuid;

use crate::{
    dtos::training::{
        AffiliationCreateRequest, CoachRequestCreateRequest, ProgramFilter,
        ProgramHistoryCreateRequest, ProgramUpsertRequest,
    },
    models::training::{
        CoachClient, CoachClientView, CoachRequest, GymCoachAffiliation, ProgramHistory,
        TrainingProgram,
    },
};

// === PROGRAMS ===

pub async fn insert_program<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: ProgramUpsertRequest,
) -> Res<TrainingProgram> {
    sqlx::query_as::<_, TrainingProgram>(
        r#"
        INSERT INTO training_programs
            (name, description, experience, purpose, days_per_week, duration_weeks, days,
             creation_type, is_public, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(data.name)
    .bind(data.description)
    .bind(data.experience)
    .bind(data.purpose)
    .bind(data.days_per_week)
    .bind(data.duration_weeks)
    .bind(Json(data.days))
    .bind(data.creation_type)
    .bind(data.is_public)
    .bind(data.created_by)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn update_program<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    program_id: Uuid,
    data: ProgramUpsertRequest,
) -> Res<TrainingProgram> {
    sqlx::query_as::<_, TrainingProgram>(
        r#"
        UPDATE training_programs SET
            name = $2,
            description = $3,
            experience = $4,
            purpose = $5,
            days_per_week = $6,
            duration_weeks = $7,
            days = $8,
            is_public = $9,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(program_id)
    .bind(data.name)
    .bind(data.description)
    .bind(data.experience)
    .bind(data.purpose)
    .bind(data.days_per_week)
    .bind(data.duration_weeks)
    .bind(Json(data.days))
    .bind(data.is_public)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn find_program<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    program_id: Uuid,
) -> Res<Option<TrainingProgram>> {
    sqlx::query_as::<_, TrainingProgram>("SELECT * FROM training_programs WHERE id = $1")
        .bind(program_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn get_programs<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    filter: ProgramFilter,
) -> Res<Vec<TrainingProgram>> {
    sqlx::query_as::<_, TrainingProgram>(
        r#"
        SELECT * FROM training_programs
        WHERE ($1::creation_type IS NULL OR creation_type = $1)
          AND ($2::uuid IS NULL OR created_by = $2)
          AND ($3::text IS NULL OR name ILIKE '%' || $3 || '%')
          AND (is_public OR creation_type = 'template' OR created_by = $4)
        ORDER BY created_at DESC
        "#,
    )
    .bind(filter.creation_type)
    .bind(filter.created_by)
    .bind(filter.search)
    .bind(filter.viewer)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

// === PROGRAM HISTORY ===

pub async fn insert_history<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: ProgramHistoryCreateRequest,
) -> Res<ProgramHistory> {
    sqlx::query_as::<_, ProgramHistory>(
        r#"
        INSERT INTO program_histories
            (user_id, program_id, program_name, assigned_by, start_date, total_days)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(data.user_id)
    .bind(data.program_id)
    .bind(data.program_name)
    .bind(data.assigned_by)
    .bind(data.start_date)
    .bind(data.total_days)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

/// Locks the user's active or paused run.
pub async fn lock_open_history<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Option<ProgramHistory>> {
    sqlx::query_as::<_, ProgramHistory>(
        r#"
        SELECT * FROM program_histories
        WHERE user_id = $1 AND status IN ('active', 'paused')
        ORDER BY created_at DESC
        LIMIT 1
        FOR UPDATE
        "#,
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn save_history<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    history: &ProgramHistory,
) -> Res<ProgramHistory> {
    sqlx::query_as::<_, ProgramHistory>(
        r#"
        UPDATE program_histories SET
            status = $2,
            end_date = $3,
            days_completed = $4,
            day_logs = $5,
            pauses_today = $6,
            last_pause_date = $7,
            last_workout_at = $8,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(history.id)
    .bind(history.status)
    .bind(history.end_date)
    .bind(history.days_completed)
    .bind(Json(&history.day_logs.0))
    .bind(history.pauses_today)
    .bind(history.last_pause_date)
    .bind(history.last_workout_at)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_histories<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Vec<ProgramHistory>> {
    sqlx::query_as::<_, ProgramHistory>(
        "SELECT * FROM program_histories WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

// === COACH REQUESTS ===

pub async fn insert_coach_request<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: CoachRequestCreateRequest,
) -> Res<CoachRequest> {
    sqlx::query_as::<_, CoachRequest>(
        r#"
        INSERT INTO coach_requests (member_id, coach_id, initiated_by, message)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(data.member_id)
    .bind(data.coach_id)
    .bind(data.initiated_by)
    .bind(data.message)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn lock_coach_request<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    request_id: Uuid,
) -> Res<Option<CoachRequest>> {
    sqlx::query_as::<_, CoachRequest>("SELECT * FROM coach_requests WHERE id = $1 FOR UPDATE")
        .bind(request_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn exists_pending_request<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    member_id: Uuid,
    coach_id: Uuid,
) -> Res<bool> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM coach_requests
            WHERE member_id = $1 AND coach_id = $2 AND status = 'pending'
        )
        "#,
    )
    .bind(member_id)
    .bind(coach_id)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn save_coach_request<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    request: &CoachRequest,
) -> Res<CoachRequest> {
    sqlx::query_as::<_, CoachRequest>(
        r#"
        UPDATE coach_requests SET status = $2, response = $3, responded_at = $4, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(request.id)
    .bind(request.status)
    .bind(&request.response)
    .bind(request.responded_at)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

/// Requests the user sent, newest first.
pub async fn get_sent_requests<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Vec<CoachRequest>> {
    sqlx::query_as::<_, CoachRequest>(
        r#"
        SELECT * FROM coach_requests
        WHERE (member_id = $1 AND initiated_by = 'member')
           OR (coach_id = $1 AND initiated_by = 'coach')
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

/// Pending requests waiting on the user's answer.
pub async fn get_received_requests<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Vec<CoachRequest>> {
    sqlx::query_as::<_, CoachRequest>(
        r#"
        SELECT * FROM coach_requests
        WHERE status = 'pending'
          AND ((coach_id = $1 AND initiated_by = 'member')
            OR (member_id = $1 AND initiated_by = 'coach'))
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

// === COACH CLIENTS ===

pub async fn insert_coach_client<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    coach_id: Uuid,
    client_id: Uuid,
    request_id: Option<Uuid>,
    started_at: DateTime<Utc>,
) -> Res<CoachClient> {
    sqlx::query_as::<_, CoachClient>(
        r#"
        INSERT INTO coach_clients (coach_id, client_id, request_id, started_at)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(coach_id)
    .bind(client_id)
    .bind(request_id)
    .bind(started_at)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

/// The client's current coaching relationship, if any.
pub async fn find_active_coaching<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    client_id: Uuid,
) -> Res<Option<CoachClient>> {
    sqlx::query_as::<_, CoachClient>(
        "SELECT * FROM coach_clients WHERE client_id = $1 AND status = 'active'",
    )
    .bind(client_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn end_coaching<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    relationship_id: Uuid,
    now: DateTime<Utc>,
) -> Res<CoachClient> {
    sqlx::query_as::<_, CoachClient>(
        r#"
        UPDATE coach_clients SET status = 'ended', ended_at = $2
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(relationship_id)
    .bind(now)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_active_clients<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    coach_id: Uuid,
) -> Res<Vec<CoachClientView>> {
    sqlx::query_as::<_, CoachClientView>(
        r#"
        SELECT cc.*, u.full_name, u.username, u.email,
            (SELECT ph.program_name FROM program_histories ph
             WHERE ph.user_id = cc.client_id AND ph.status IN ('active', 'paused')
             ORDER BY ph.created_at DESC LIMIT 1) AS current_program,
            (SELECT MAX(ph.last_workout_at) FROM program_histories ph
             WHERE ph.user_id = cc.client_id) AS last_workout_at
        FROM coach_clients cc
        JOIN users u ON u.id = cc.client_id
        WHERE cc.coach_id = $1 AND cc.status = 'active'
        ORDER BY cc.started_at DESC
        "#,
    )
    .bind(coach_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

// === GYM COACH AFFILIATIONS ===

pub async fn insert_affiliation<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: AffiliationCreateRequest,
) -> Res<GymCoachAffiliation> {
    sqlx::query_as::<_, GymCoachAffiliation>(
        r#"
        INSERT INTO gym_coach_affiliations
            (gym_id, coach_id, initiated_by, message, permissions, is_exclusive, commission_rate)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(data.gym_id)
    .bind(data.coach_id)
    .bind(data.initiated_by)
    .bind(data.message)
    .bind(Json(data.permissions))
    .bind(data.is_exclusive)
    .bind(data.commission_rate)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn lock_affiliation<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    affiliation_id: Uuid,
) -> Res<Option<GymCoachAffiliation>> {
    sqlx::query_as::<_, GymCoachAffiliation>(
        "SELECT * FROM gym_coach_affiliations WHERE id = $1 FOR UPDATE",
    )
    .bind(affiliation_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

/// Pending or active affiliation between a gym and a coach.
pub async fn find_open_affiliation<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    gym_id: Uuid,
    coach_id: Uuid,
) -> Res<Option<GymCoachAffiliation>> {
    sqlx::query_as::<_, GymCoachAffiliation>(
        r#"
        SELECT * FROM gym_coach_affiliations
        WHERE gym_id = $1 AND coach_id = $2 AND status IN ('pending', 'active')
        "#,
    )
    .bind(gym_id)
    .bind(coach_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

/// Clears declined and terminated rows so the pair can start over.
pub async fn delete_closed_affiliations<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    gym_id: Uuid,
    coach_id: Uuid,
) -> Res<u64> {
    sqlx::query(
        r#"
        DELETE FROM gym_coach_affiliations
        WHERE gym_id = $1 AND coach_id = $2 AND status IN ('declined', 'terminated')
        "#,
    )
    .bind(gym_id)
    .bind(coach_id)
    .execute(executor)
    .await
    .map(|r| r.rows_affected())
    .map_err(AppError::from)
}

pub async fn save_affiliation<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    affiliation: &GymCoachAffiliation,
) -> Res<GymCoachAffiliation> {
    sqlx::query_as::<_, GymCoachAffiliation>(
        r#"
        UPDATE gym_coach_affiliations SET
            status = $2, start_date = $3, end_date = $4, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(affiliation.id)
    .bind(affiliation.status)
    .bind(affiliation.start_date)
    .bind(affiliation.end_date)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_gym_affiliations<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    gym_id: Uuid,
) -> Res<Vec<GymCoachAffiliation>> {
    sqlx::query_as::<_, GymCoachAffiliation>(
        r#"
        SELECT * FROM gym_coach_affiliations
        WHERE gym_id = $1 AND status IN ('pending', 'active')
        ORDER BY created_at DESC
        "#,
    )
    .bind(gym_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_coach_affiliations<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    coach_id: Uuid,
) -> Res<Vec<GymCoachAffiliation>> {
    sqlx::query_as::<_, GymCoachAffiliation>(
        r#"
        SELECT * FROM gym_coach_affiliations
        WHERE coach_id = $1 AND status IN ('pending', 'active')
        ORDER BY created_at DESC
        "#,
    )
    .bind(coach_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}
