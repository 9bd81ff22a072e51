use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    dtos::operations::{AttendanceCreateRequest, ClassCreateRequest, EquipmentUpsertRequest},
    models::operations::{
        AttendanceRecord, BookingStatus, ClassBooking, EquipmentItem, GymClass,
    },
};

// === ATTENDANCE ===

pub async fn insert_attendance<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: AttendanceCreateRequest,
) -> Res<AttendanceRecord> {
    sqlx::query_as::<_, AttendanceRecord>(
        r#"
        INSERT INTO attendance_records (gym_id, user_id, status, notes)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(data.gym_id)
    .bind(data.user_id)
    .bind(data.status)
    .bind(data.notes)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn find_open_check_in<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    gym_id: Uuid,
    user_id: Uuid,
) -> Res<Option<AttendanceRecord>> {
    sqlx::query_as::<_, AttendanceRecord>(
        r#"
        SELECT * FROM attendance_records
        WHERE gym_id = $1 AND user_id = $2 AND status = 'checked_in'
        ORDER BY check_in_time DESC
        LIMIT 1
        "#,
    )
    .bind(gym_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn check_out<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    record_id: Uuid,
    now: DateTime<Utc>,
) -> Res<AttendanceRecord> {
    sqlx::query_as::<_, AttendanceRecord>(
        r#"
        UPDATE attendance_records SET status = 'checked_out', check_out_time = $2
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(record_id)
    .bind(now)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_attendance<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    gym_id: Uuid,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Res<Vec<AttendanceRecord>> {
    sqlx::query_as::<_, AttendanceRecord>(
        r#"
        SELECT * FROM attendance_records
        WHERE gym_id = $1 AND check_in_time >= $2 AND check_in_time < $3
        ORDER BY check_in_time DESC
        "#,
    )
    .bind(gym_id)
    .bind(from)
    .bind(to)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

// === CLASSES ===

pub async fn insert_class<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: ClassCreateRequest,
) -> Res<GymClass> {
    sqlx::query_as::<_, GymClass>(
        r#"
        INSERT INTO gym_classes (gym_id, coach_id, name, description, starts_at, ends_at, capacity)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(data.gym_id)
    .bind(data.coach_id)
    .bind(data.name)
    .bind(data.description)
    .bind(data.starts_at)
    .bind(data.ends_at)
    .bind(data.capacity)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_classes<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    gym_id: Uuid,
    from: DateTime<Utc>,
) -> Res<Vec<GymClass>> {
    sqlx::query_as::<_, GymClass>(
        "SELECT * FROM gym_classes WHERE gym_id = $1 AND ends_at >= $2 ORDER BY starts_at",
    )
    .bind(gym_id)
    .bind(from)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

/// Locks the class row so concurrent bookings see a consistent seat count.
pub async fn lock_class<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    gym_id: Uuid,
    class_id: Uuid,
) -> Res<Option<GymClass>> {
    sqlx::query_as::<_, GymClass>(
        "SELECT * FROM gym_classes WHERE id = $1 AND gym_id = $2 FOR UPDATE",
    )
    .bind(class_id)
    .bind(gym_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn count_active_bookings<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    class_id: Uuid,
) -> Res<i64> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM class_bookings WHERE class_id = $1 AND status <> 'cancelled'",
    )
    .bind(class_id)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn find_booking<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    class_id: Uuid,
    user_id: Uuid,
) -> Res<Option<ClassBooking>> {
    sqlx::query_as::<_, ClassBooking>(
        "SELECT * FROM class_bookings WHERE class_id = $1 AND user_id = $2",
    )
    .bind(class_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

/// Creates the booking or revives a cancelled one.
pub async fn upsert_booking<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    class_id: Uuid,
    user_id: Uuid,
) -> Res<ClassBooking> {
    sqlx::query_as::<_, ClassBooking>(
        r#"
        INSERT INTO class_bookings (class_id, user_id) VALUES ($1, $2)
        ON CONFLICT (class_id, user_id) DO UPDATE SET status = 'booked'
        RETURNING *
        "#,
    )
    .bind(class_id)
    .bind(user_id)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn set_booking_status<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    booking_id: Uuid,
    status: BookingStatus,
) -> Res<ClassBooking> {
    sqlx::query_as::<_, ClassBooking>(
        "UPDATE class_bookings SET status = $2 WHERE id = $1 RETURNING *",
    )
    .bind(booking_id)
    .bind(status)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

// === EQUIPMENT ===

pub async fn insert_equipment<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    gym_id: Uuid,
    data: EquipmentUpsertRequest,
) -> Res<EquipmentItem> {
    sqlx::query_as::<_, EquipmentItem>(
        r#"
        INSERT INTO equipment_items (gym_id, name, category, quantity, condition, purchased_at, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(gym_id)
    .bind(data.name)
    .bind(data.category)
    .bind(data.quantity)
    .bind(data.condition)
    .bind(data.purchased_at)
    .bind(data.notes)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_equipment<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    gym_id: Uuid,
) -> Res<Vec<EquipmentItem>> {
    sqlx::query_as::<_, EquipmentItem>(
        "SELECT * FROM equipment_items WHERE gym_id = $1 ORDER BY name",
    )
    .bind(gym_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn update_equipment<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    gym_id: Uuid,
    item_id: Uuid,
    data: EquipmentUpsertRequest,
) -> Res<Option<EquipmentItem>> {
    sqlx::query_as::<_, EquipmentItem>(
        r#"
        UPDATE equipment_items SET
            name = $3, category = $4, quantity = $5, condition = $6,
            purchased_at = $7, notes = $8, updated_at = NOW()
        WHERE id = $1 AND gym_id = $2
        RETURNING *
        "#,
    )
    .bind(item_id)
    .bind(gym_id)
    .bind(data.name)
    .bind(data.category)
    .bind(data.quantity)
    .bind(data.condition)
    .bind(data.purchased_at)
    .bind(data.notes)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn delete_equipment<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    gym_id: Uuid,
    item_id: Uuid,
) -> Res<bool> {
    let result = sqlx::query("DELETE FROM equipment_items WHERE id = $1 AND gym_id = $2")
        .bind(item_id)
        .bind(gym_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() == 1)
}
