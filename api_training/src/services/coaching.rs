//! Coach and client relationships.
//!
//! Either side may open a request. Only the other side answers it, and an
//! accepted request becomes a `coach_clients` row. A client has at most one
//! active coach. The coach can assign a program to the client, and can
//! withdraw only a program they assigned.

use chrono::{DateTime, Utc};
use common::error::{AppError, ErrorCode, Res};
use db::{
    dtos::{training::CoachRequestCreateRequest, user::NotificationCreateRequest},
    models::{
        training::{
            CoachClient, CoachClientView, CoachRequest, CoachRequestStatus, ProgramHistory,
            RequestInitiator, TrainingProgram,
        },
        user::{User, UserRole},
    },
};
use serde_json::json;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::services::history;

/// Applies the recipient's answer to a pending request.
pub fn respond_transition(
    request: &mut CoachRequest,
    responder: Uuid,
    accept: bool,
    response: Option<String>,
    now: DateTime<Utc>,
) -> Res<()> {
    if request.recipient() != responder {
        return Err(AppError::Forbidden("Only the recipient can answer this request".to_string()));
    }
    if request.status != CoachRequestStatus::Pending {
        return Err(AppError::BadRequest("This request has already been answered".to_string()));
    }
    request.status = if accept {
        CoachRequestStatus::Accepted
    } else {
        CoachRequestStatus::Declined
    };
    request.response = response;
    request.responded_at = Some(now);
    Ok(())
}

/// The relationship must be active and belong to `coach_id`.
pub fn ensure_coach_of(relationship: Option<CoachClient>, coach_id: Uuid) -> Res<CoachClient> {
    relationship
        .filter(|r| r.coach_id == coach_id)
        .ok_or_else(|| AppError::Forbidden("This user is not your client".to_string()))
}

/// Coaches may assign public programs, templates and their own.
pub fn ensure_assignable(program: &TrainingProgram, coach_id: Uuid) -> Res<()> {
    if !program.is_visible_to(coach_id) {
        return Err(AppError::coded(ErrorCode::ProgramNotFound, "Program not found"));
    }
    Ok(())
}

/// Abandons a run the coach assigned. Runs the client started alone stay.
pub fn unassign_transition(history: &mut ProgramHistory, coach_id: Uuid, now: DateTime<Utc>) -> Res<()> {
    if history.assigned_by != Some(coach_id) {
        return Err(AppError::Forbidden(
            "The active program was not assigned by you".to_string(),
        ));
    }
    history::abandon(history, now)
}

fn is_coach(user: &User) -> bool {
    user.role == UserRole::Coach
}

/// Loads a user holding the coach role. Anyone else reads as missing.
pub async fn find_coach(conn: &mut PgConnection, coach_id: Uuid) -> Res<User> {
    let not_found = || AppError::coded(ErrorCode::CoachNotFound, "Coach not found");
    let user = db::user::get_user_by_id(&mut *conn, coach_id)
        .await
        .map_err(|e| match e {
            AppError::Database(sqlx::Error::RowNotFound) => not_found(),
            other => other,
        })?;
    if !is_coach(&user) {
        return Err(not_found());
    }
    Ok(user)
}

async fn notify(conn: &mut PgConnection, user_id: Uuid, key: &str, vars: serde_json::Value) -> Res<()> {
    db::notification::insert_notification(
        &mut *conn,
        NotificationCreateRequest {
            user_id,
            key: key.to_string(),
            vars,
        },
    )
    .await?;
    Ok(())
}

async fn open_request(
    conn: &mut PgConnection,
    member: &User,
    coach: &User,
    initiated_by: RequestInitiator,
    message: Option<String>,
) -> Res<CoachRequest> {
    if member.id == coach.id {
        return Err(AppError::BadRequest("You cannot coach yourself".to_string()));
    }
    if db::training::exists_pending_request(&mut *conn, member.id, coach.id).await? {
        return Err(AppError::coded(
            ErrorCode::CoachRequestAlreadyExists,
            "A pending request already exists",
        ));
    }
    let current = db::training::find_active_coaching(&mut *conn, member.id).await?;
    if current.is_some_and(|r| r.coach_id == coach.id) {
        return Err(AppError::Conflict("Already coaching this client".to_string()));
    }

    let request = db::training::insert_coach_request(
        &mut *conn,
        CoachRequestCreateRequest {
            member_id: member.id,
            coach_id: coach.id,
            initiated_by,
            message,
        },
    )
    .await?;

    let (recipient, sender) = match initiated_by {
        RequestInitiator::Member => (coach, member),
        RequestInitiator::Coach => (member, coach),
    };
    notify(
        conn,
        recipient.id,
        "notifications.coaching.request_received",
        json!({ "fromName": sender.full_name, "requestId": request.id }),
    )
    .await?;
    Ok(request)
}

/// A member asks a coach to take them on.
pub async fn request_coach(
    conn: &mut PgConnection,
    member_id: Uuid,
    coach_id: Uuid,
    message: Option<String>,
) -> Res<CoachRequest> {
    let coach = find_coach(conn, coach_id).await?;
    let member = db::user::get_user_by_id(&mut *conn, member_id).await?;
    open_request(conn, &member, &coach, RequestInitiator::Member, message).await
}

/// A coach offers to train a member.
pub async fn offer_coaching(
    conn: &mut PgConnection,
    coach_id: Uuid,
    member_id: Uuid,
    message: Option<String>,
) -> Res<CoachRequest> {
    let coach = db::user::get_user_by_id(&mut *conn, coach_id).await?;
    if !is_coach(&coach) {
        return Err(AppError::Forbidden("Only coaches can offer coaching".to_string()));
    }
    let member = db::user::get_user_by_id(&mut *conn, member_id).await?;
    open_request(conn, &member, &coach, RequestInitiator::Coach, message).await
}

pub async fn respond(
    conn: &mut PgConnection,
    request_id: Uuid,
    responder: Uuid,
    accept: bool,
    response: Option<String>,
    now: DateTime<Utc>,
) -> Res<CoachRequest> {
    let mut request = db::training::lock_coach_request(&mut *conn, request_id)
        .await?
        .ok_or_else(|| AppError::coded(ErrorCode::CoachRequestNotFound, "Request not found"))?;
    respond_transition(&mut request, responder, accept, response, now)?;

    if accept {
        if db::training::find_active_coaching(&mut *conn, request.member_id).await?.is_some() {
            return Err(AppError::Conflict("This member already has a coach".to_string()));
        }
        db::training::insert_coach_client(
            &mut *conn,
            request.coach_id,
            request.member_id,
            Some(request.id),
            now,
        )
        .await?;
        log::info!("Coach {} now trains {}", request.coach_id, request.member_id);
    }

    let saved = db::training::save_coach_request(&mut *conn, &request).await?;
    let key = if accept {
        "notifications.coaching.request_accepted"
    } else {
        "notifications.coaching.request_declined"
    };
    notify(conn, saved.sender(), key, json!({ "requestId": saved.id })).await?;
    Ok(saved)
}

pub async fn sent_requests(conn: &mut PgConnection, user_id: Uuid) -> Res<Vec<CoachRequest>> {
    db::training::get_sent_requests(&mut *conn, user_id).await
}

pub async fn received_requests(conn: &mut PgConnection, user_id: Uuid) -> Res<Vec<CoachRequest>> {
    db::training::get_received_requests(&mut *conn, user_id).await
}

pub async fn clients(conn: &mut PgConnection, coach_id: Uuid) -> Res<Vec<CoachClientView>> {
    db::training::get_active_clients(&mut *conn, coach_id).await
}

pub async fn end_relationship(
    conn: &mut PgConnection,
    coach_id: Uuid,
    client_id: Uuid,
    now: DateTime<Utc>,
) -> Res<CoachClient> {
    let current = db::training::find_active_coaching(&mut *conn, client_id).await?;
    let relationship = ensure_coach_of(current, coach_id)?;
    let ended = db::training::end_coaching(&mut *conn, relationship.id, now).await?;
    notify(
        conn,
        client_id,
        "notifications.coaching.ended",
        json!({ "coachId": coach_id }),
    )
    .await?;
    Ok(ended)
}

/// Starts `program_id` for the client on the coach's behalf.
pub async fn assign_program(
    conn: &mut PgConnection,
    coach_id: Uuid,
    client_id: Uuid,
    program_id: Uuid,
    now: DateTime<Utc>,
) -> Res<ProgramHistory> {
    let current = db::training::find_active_coaching(&mut *conn, client_id).await?;
    ensure_coach_of(current, coach_id)?;
    let program = db::training::find_program(&mut *conn, program_id)
        .await?
        .ok_or_else(|| AppError::coded(ErrorCode::ProgramNotFound, "Program not found"))?;
    ensure_assignable(&program, coach_id)?;

    let run = history::start(conn, client_id, &program, Some(coach_id), now).await?;
    notify(
        conn,
        client_id,
        "notifications.training.program_assigned",
        json!({ "programName": program.name }),
    )
    .await?;
    Ok(run)
}

pub async fn unassign_program(
    conn: &mut PgConnection,
    coach_id: Uuid,
    client_id: Uuid,
    now: DateTime<Utc>,
) -> Res<ProgramHistory> {
    let current = db::training::find_active_coaching(&mut *conn, client_id).await?;
    ensure_coach_of(current, coach_id)?;
    let mut run = history::active(conn, client_id).await?;
    unassign_transition(&mut run, coach_id, now)?;
    db::training::save_history(&mut *conn, &run).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{history::tests::history, program::tests::program};
    use chrono::TimeZone;
    use db::models::training::{CoachingStatus, CreationType, ProgramStatus};

    fn pending(initiated_by: RequestInitiator) -> CoachRequest {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        CoachRequest {
            id: Uuid::new_v4(),
            member_id: Uuid::new_v4(),
            coach_id: Uuid::new_v4(),
            initiated_by,
            message: None,
            status: CoachRequestStatus::Pending,
            response: None,
            responded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn relationship(coach_id: Uuid) -> CoachClient {
        CoachClient {
            id: Uuid::new_v4(),
            coach_id,
            client_id: Uuid::new_v4(),
            request_id: None,
            status: CoachingStatus::Active,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    #[test]
    fn coach_accepts_member_request() {
        let now = Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap();
        let mut request = pending(RequestInitiator::Member);
        let coach = request.coach_id;
        respond_transition(&mut request, coach, true, Some("Welcome".to_string()), now).unwrap();
        assert_eq!(request.status, CoachRequestStatus::Accepted);
        assert_eq!(request.responded_at, Some(now));
        assert_eq!(request.response.as_deref(), Some("Welcome"));
        assert_eq!(request.sender(), request.member_id);
    }

    #[test]
    fn member_declines_coach_offer() {
        let now = Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap();
        let mut request = pending(RequestInitiator::Coach);
        let member = request.member_id;
        respond_transition(&mut request, member, false, None, now).unwrap();
        assert_eq!(request.status, CoachRequestStatus::Declined);
    }

    #[test]
    fn only_the_recipient_answers_once() {
        let now = Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap();
        let mut request = pending(RequestInitiator::Member);
        let member = request.member_id;
        let err = respond_transition(&mut request, member, true, None, now).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InsufficientPermissions);
        assert_eq!(request.status, CoachRequestStatus::Pending);

        let coach = request.coach_id;
        respond_transition(&mut request, coach, false, None, now).unwrap();
        assert!(respond_transition(&mut request, coach, true, None, now).is_err());
        assert_eq!(request.status, CoachRequestStatus::Declined);
    }

    #[test]
    fn assignment_needs_own_client_and_visible_program() {
        let coach = Uuid::new_v4();
        assert!(ensure_coach_of(Some(relationship(coach)), coach).is_ok());
        assert!(ensure_coach_of(Some(relationship(Uuid::new_v4())), coach).is_err());
        assert!(ensure_coach_of(None, coach).is_err());

        assert!(ensure_assignable(&program(Some(coach), CreationType::Coach, false), coach).is_ok());
        assert!(ensure_assignable(&program(None, CreationType::Template, false), coach).is_ok());
        let err = ensure_assignable(&program(Some(Uuid::new_v4()), CreationType::Member, false), coach)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ProgramNotFound);
    }

    #[test]
    fn unassign_only_touches_the_coachs_run() {
        let now = Utc.with_ymd_and_hms(2025, 6, 3, 10, 0, 0).unwrap();
        let coach = Uuid::new_v4();

        let mut assigned = history(12, Some(coach));
        unassign_transition(&mut assigned, coach, now).unwrap();
        assert_eq!(assigned.status, ProgramStatus::Abandoned);
        assert_eq!(assigned.end_date, Some(now));

        let mut self_started = history(12, None);
        assert!(unassign_transition(&mut self_started, coach, now).is_err());
        assert_eq!(self_started.status, ProgramStatus::Active);

        let mut other_coach = history(12, Some(Uuid::new_v4()));
        assert!(unassign_transition(&mut other_coach, coach, now).is_err());
    }
}
