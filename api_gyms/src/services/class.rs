use chrono::{DateTime, Utc};
use common::error::{AppError, ErrorCode, Res};
use db::{
    dtos::operations::ClassCreateRequest,
    models::{
        membership::MembershipStatus,
        operations::{BookingStatus, ClassBooking, GymClass},
    },
};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::dtos::operations::CreateClassRequest;

pub fn validate_class(req: &CreateClassRequest, now: DateTime<Utc>) -> Res<()> {
    if req.name.trim().is_empty() {
        return Err(AppError::coded(ErrorCode::ValidationError, "Class name is required"));
    }
    if req.capacity <= 0 {
        return Err(AppError::coded(ErrorCode::ValidationError, "Capacity must be positive"));
    }
    if req.ends_at <= req.starts_at {
        return Err(AppError::coded(ErrorCode::ValidationError, "A class must end after it starts"));
    }
    if req.starts_at < now {
        return Err(AppError::coded(ErrorCode::ValidationError, "A class cannot start in the past"));
    }
    Ok(())
}

pub async fn create_class(
    conn: &mut PgConnection,
    gym_id: Uuid,
    req: CreateClassRequest,
    now: DateTime<Utc>,
) -> Res<GymClass> {
    validate_class(&req, now)?;

    if let Some(coach_id) = req.coach_id {
        let coach = db::membership::find_membership(&mut *conn, gym_id, coach_id).await?;
        if !coach.is_some_and(|m| m.has_role(db::models::user::UserRole::Coach)) {
            return Err(AppError::BadRequest("Coach is not on this gym's staff".to_string()));
        }
    }

    db::operations::insert_class(
        &mut *conn,
        ClassCreateRequest {
            gym_id,
            coach_id: req.coach_id,
            name: req.name.trim().to_string(),
            description: req.description,
            starts_at: req.starts_at,
            ends_at: req.ends_at,
            capacity: req.capacity,
        },
    )
    .await
}

/// Classes that have not ended yet.
pub async fn upcoming(conn: &mut PgConnection, gym_id: Uuid, now: DateTime<Utc>) -> Res<Vec<GymClass>> {
    db::operations::get_classes(&mut *conn, gym_id, now).await
}

/// Books `user_id` into a class. The class row is locked so concurrent
/// bookings cannot exceed capacity.
pub async fn book(
    conn: &mut PgConnection,
    gym_id: Uuid,
    class_id: Uuid,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Res<ClassBooking> {
    let class = db::operations::lock_class(&mut *conn, gym_id, class_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Class not found".to_string()))?;
    if class.starts_at <= now {
        return Err(AppError::BadRequest("This class has already started".to_string()));
    }

    let active = db::membership::find_membership(&mut *conn, gym_id, user_id)
        .await?
        .is_some_and(|m| m.status == MembershipStatus::Active);
    if !active {
        return Err(AppError::coded(
            ErrorCode::MembershipInactive,
            "An active membership is required to book classes",
        ));
    }

    let existing = db::operations::find_booking(&mut *conn, class_id, user_id).await?;
    if existing.as_ref().is_some_and(|b| b.status != BookingStatus::Cancelled) {
        return Err(AppError::Conflict("Already booked into this class".to_string()));
    }

    let booked = db::operations::count_active_bookings(&mut *conn, class_id).await?;
    if booked >= class.capacity as i64 {
        return Err(AppError::coded(ErrorCode::ClassFull, "This class is full"));
    }

    db::operations::upsert_booking(&mut *conn, class_id, user_id).await
}

pub async fn cancel_booking(
    conn: &mut PgConnection,
    gym_id: Uuid,
    class_id: Uuid,
    user_id: Uuid,
) -> Res<ClassBooking> {
    db::operations::lock_class(&mut *conn, gym_id, class_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Class not found".to_string()))?;
    let booking = db::operations::find_booking(&mut *conn, class_id, user_id)
        .await?
        .filter(|b| b.status == BookingStatus::Booked)
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
    db::operations::set_booking_status(&mut *conn, booking.id, BookingStatus::Cancelled).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn request(starts_in_hours: i64, length_hours: i64, capacity: i32) -> (CreateClassRequest, DateTime<Utc>) {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap();
        let starts_at = now + Duration::hours(starts_in_hours);
        (
            CreateClassRequest {
                name: "Spin".to_string(),
                description: None,
                coach_id: None,
                starts_at,
                ends_at: starts_at + Duration::hours(length_hours),
                capacity,
            },
            now,
        )
    }

    #[test]
    fn accepts_a_future_class() {
        let (req, now) = request(2, 1, 12);
        assert!(validate_class(&req, now).is_ok());
    }

    #[test]
    fn rejects_bad_schedules() {
        let (req, now) = request(-1, 1, 12);
        assert!(validate_class(&req, now).is_err());
        let (req, now) = request(2, 0, 12);
        assert!(validate_class(&req, now).is_err());
        let (req, now) = request(2, 1, 0);
        assert_eq!(validate_class(&req, now).unwrap_err().code(), ErrorCode::ValidationError);
    }
}
