//! Coaches working with gyms.
//!
//! A gym invites a coach or a coach asks to join a gym. The other party
//! answers. Only one pending or active affiliation exists per pair;
//! declined and terminated rows are cleared when the pair starts over.

use api_gyms::services::permissions;
use chrono::{DateTime, Utc};
use common::error::{AppError, ErrorCode, Res};
use db::{
    dtos::{training::AffiliationCreateRequest, user::NotificationCreateRequest},
    models::{
        gym::Gym,
        membership::GymPermission,
        training::{AffiliationInitiator, AffiliationPermissions, AffiliationStatus, GymCoachAffiliation},
        user::UserRole,
    },
};
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{dtos::coaching::InviteCoachRequest, services::coaching};

fn invalid_action(message: &str) -> AppError {
    AppError::coded(ErrorCode::AffiliationInvalidAction, message)
}

pub fn validate_commission(rate: Option<f64>) -> Res<()> {
    match rate {
        Some(rate) if !(0.0..=100.0).contains(&rate) => Err(AppError::coded(
            ErrorCode::ValidationError,
            "Commission rate must be between 0 and 100",
        )),
        _ => Ok(()),
    }
}

/// `side` is the party answering; it must not be the one that asked.
pub fn respond_transition(
    affiliation: &mut GymCoachAffiliation,
    side: AffiliationInitiator,
    accept: bool,
    now: DateTime<Utc>,
) -> Res<()> {
    if affiliation.status != AffiliationStatus::Pending {
        return Err(invalid_action("Only pending affiliations can be answered"));
    }
    if affiliation.initiated_by == side {
        return Err(AppError::Forbidden("You cannot answer your own request".to_string()));
    }
    if accept {
        affiliation.status = AffiliationStatus::Active;
        affiliation.start_date = Some(now);
    } else {
        affiliation.status = AffiliationStatus::Declined;
    }
    Ok(())
}

/// Either side may end an open affiliation.
pub fn terminate_transition(affiliation: &mut GymCoachAffiliation, now: DateTime<Utc>) -> Res<()> {
    match affiliation.status {
        AffiliationStatus::Pending | AffiliationStatus::Active => {
            affiliation.status = AffiliationStatus::Terminated;
            affiliation.end_date = Some(now);
            Ok(())
        }
        _ => Err(invalid_action("This affiliation is already closed")),
    }
}

/// Which side `user_id` acts for. Gym staff need `staff:manage`.
pub async fn party(pool: &PgPool, affiliation: &GymCoachAffiliation, user_id: Uuid) -> Res<AffiliationInitiator> {
    if affiliation.coach_id == user_id {
        return Ok(AffiliationInitiator::Coach);
    }
    permissions::authorize(pool, user_id, affiliation.gym_id, &[GymPermission::StaffManage]).await?;
    Ok(AffiliationInitiator::Gym)
}

pub async fn locked(conn: &mut PgConnection, affiliation_id: Uuid) -> Res<GymCoachAffiliation> {
    db::training::lock_affiliation(&mut *conn, affiliation_id)
        .await?
        .ok_or_else(|| AppError::coded(ErrorCode::AffiliationNotFound, "Affiliation not found"))
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

async fn ensure_free_pair(conn: &mut PgConnection, gym_id: Uuid, coach_id: Uuid) -> Res<()> {
    if db::training::find_open_affiliation(&mut *conn, gym_id, coach_id).await?.is_some() {
        return Err(AppError::coded(
            ErrorCode::AffiliationAlreadyExists,
            "This coach already has a pending or active affiliation with the gym",
        ));
    }
    let cleared = db::training::delete_closed_affiliations(&mut *conn, gym_id, coach_id).await?;
    if cleared > 0 {
        log::debug!("Cleared {} closed affiliations for gym {} and coach {}", cleared, gym_id, coach_id);
    }
    Ok(())
}

pub async fn invite(conn: &mut PgConnection, gym: &Gym, req: InviteCoachRequest) -> Res<GymCoachAffiliation> {
    validate_commission(req.commission_rate)?;
    let coach = coaching::find_coach(conn, req.coach_id).await?;
    ensure_free_pair(conn, gym.id, coach.id).await?;

    let affiliation = db::training::insert_affiliation(
        &mut *conn,
        AffiliationCreateRequest {
            gym_id: gym.id,
            coach_id: coach.id,
            initiated_by: AffiliationInitiator::Gym,
            message: req.message,
            permissions: req.permissions,
            is_exclusive: req.is_exclusive,
            commission_rate: req.commission_rate,
        },
    )
    .await?;
    notify(
        conn,
        coach.id,
        "notifications.affiliation.invited",
        json!({ "gymName": gym.name, "affiliationId": affiliation.id }),
    )
    .await?;
    log::info!("Gym {} invited coach {}", gym.id, coach.id);
    Ok(affiliation)
}

pub async fn request_gym(
    conn: &mut PgConnection,
    coach_id: Uuid,
    gym_id: Uuid,
    message: Option<String>,
) -> Res<GymCoachAffiliation> {
    let coach = db::user::get_user_by_id(&mut *conn, coach_id).await?;
    if coach.role != UserRole::Coach {
        return Err(AppError::Forbidden("Only coaches can ask to join a gym".to_string()));
    }
    let gym = db::gym::find_gym_by_id(&mut *conn, gym_id)
        .await?
        .ok_or_else(|| AppError::coded(ErrorCode::GymNotFound, "Gym not found"))?;
    ensure_free_pair(conn, gym.id, coach.id).await?;

    let affiliation = db::training::insert_affiliation(
        &mut *conn,
        AffiliationCreateRequest {
            gym_id: gym.id,
            coach_id: coach.id,
            initiated_by: AffiliationInitiator::Coach,
            message,
            permissions: AffiliationPermissions::default(),
            is_exclusive: false,
            commission_rate: None,
        },
    )
    .await?;
    notify(
        conn,
        gym.owner_id,
        "notifications.affiliation.requested",
        json!({ "coachName": coach.full_name, "affiliationId": affiliation.id }),
    )
    .await?;
    Ok(affiliation)
}

/// Saves the answer and tells the side that asked.
pub async fn respond(
    conn: &mut PgConnection,
    mut affiliation: GymCoachAffiliation,
    side: AffiliationInitiator,
    accept: bool,
    now: DateTime<Utc>,
) -> Res<GymCoachAffiliation> {
    respond_transition(&mut affiliation, side, accept, now)?;
    let saved = db::training::save_affiliation(&mut *conn, &affiliation).await?;

    let asker = match saved.initiated_by {
        AffiliationInitiator::Coach => db::gym::find_gym_by_id(&mut *conn, saved.gym_id)
            .await?
            .map(|g| g.owner_id),
        AffiliationInitiator::Gym => Some(saved.coach_id),
    };
    if let Some(user_id) = asker {
        let key = if accept {
            "notifications.affiliation.accepted"
        } else {
            "notifications.affiliation.declined"
        };
        notify(conn, user_id, key, json!({ "affiliationId": saved.id })).await?;
    }
    Ok(saved)
}

pub async fn terminate(
    conn: &mut PgConnection,
    mut affiliation: GymCoachAffiliation,
    now: DateTime<Utc>,
) -> Res<GymCoachAffiliation> {
    terminate_transition(&mut affiliation, now)?;
    let saved = db::training::save_affiliation(&mut *conn, &affiliation).await?;
    log::info!("Affiliation {} terminated", saved.id);
    Ok(saved)
}

pub async fn for_gym(conn: &mut PgConnection, gym_id: Uuid) -> Res<Vec<GymCoachAffiliation>> {
    db::training::get_gym_affiliations(&mut *conn, gym_id).await
}

pub async fn for_coach(conn: &mut PgConnection, coach_id: Uuid) -> Res<Vec<GymCoachAffiliation>> {
    db::training::get_coach_affiliations(&mut *conn, coach_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sqlx::types::Json;

    fn affiliation(initiated_by: AffiliationInitiator) -> GymCoachAffiliation {
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap();
        GymCoachAffiliation {
            id: Uuid::new_v4(),
            gym_id: Uuid::new_v4(),
            coach_id: Uuid::new_v4(),
            status: AffiliationStatus::Pending,
            initiated_by,
            message: None,
            permissions: Json(AffiliationPermissions::default()),
            is_exclusive: false,
            commission_rate: Some(20.0),
            start_date: None,
            end_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn coach_accepts_gym_invite() {
        let now = Utc.with_ymd_and_hms(2025, 7, 2, 9, 0, 0).unwrap();
        let mut invite = affiliation(AffiliationInitiator::Gym);
        respond_transition(&mut invite, AffiliationInitiator::Coach, true, now).unwrap();
        assert_eq!(invite.status, AffiliationStatus::Active);
        assert_eq!(invite.start_date, Some(now));
    }

    #[test]
    fn gym_declines_coach_request() {
        let now = Utc.with_ymd_and_hms(2025, 7, 2, 9, 0, 0).unwrap();
        let mut request = affiliation(AffiliationInitiator::Coach);
        respond_transition(&mut request, AffiliationInitiator::Gym, false, now).unwrap();
        assert_eq!(request.status, AffiliationStatus::Declined);
        assert!(request.start_date.is_none());
    }

    #[test]
    fn asker_cannot_answer_and_answers_happen_once() {
        let now = Utc.with_ymd_and_hms(2025, 7, 2, 9, 0, 0).unwrap();
        let mut invite = affiliation(AffiliationInitiator::Gym);
        assert!(respond_transition(&mut invite, AffiliationInitiator::Gym, true, now).is_err());
        assert_eq!(invite.status, AffiliationStatus::Pending);

        respond_transition(&mut invite, AffiliationInitiator::Coach, true, now).unwrap();
        let err = respond_transition(&mut invite, AffiliationInitiator::Coach, false, now).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AffiliationInvalidAction);
    }

    #[test]
    fn terminate_closes_open_affiliations() {
        let now = Utc.with_ymd_and_hms(2025, 9, 1, 9, 0, 0).unwrap();
        let mut active = affiliation(AffiliationInitiator::Gym);
        active.status = AffiliationStatus::Active;
        terminate_transition(&mut active, now).unwrap();
        assert_eq!(active.status, AffiliationStatus::Terminated);
        assert_eq!(active.end_date, Some(now));

        let err = terminate_transition(&mut active, now).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AffiliationInvalidAction);
    }

    #[test]
    fn commission_is_a_percentage() {
        assert!(validate_commission(None).is_ok());
        assert!(validate_commission(Some(0.0)).is_ok());
        assert!(validate_commission(Some(100.0)).is_ok());
        assert!(validate_commission(Some(100.5)).is_err());
        assert!(validate_commission(Some(-1.0)).is_err());
    }
}
