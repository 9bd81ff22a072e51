use common::error::{AppError, ErrorCode, Res};
use db::{dtos::operations::EquipmentUpsertRequest, models::operations::EquipmentItem};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::dtos::operations::EquipmentRequest;

fn to_upsert(req: EquipmentRequest) -> Res<EquipmentUpsertRequest> {
    if req.name.trim().is_empty() {
        return Err(AppError::coded(ErrorCode::ValidationError, "Equipment name is required"));
    }
    if req.quantity < 0 {
        return Err(AppError::coded(ErrorCode::ValidationError, "Quantity cannot be negative"));
    }
    Ok(EquipmentUpsertRequest {
        name: req.name.trim().to_string(),
        category: req.category,
        quantity: req.quantity,
        condition: req.condition,
        purchased_at: req.purchased_at,
        notes: req.notes,
    })
}

fn not_found() -> AppError {
    AppError::NotFound("Equipment item not found".to_string())
}

pub async fn list(conn: &mut PgConnection, gym_id: Uuid) -> Res<Vec<EquipmentItem>> {
    db::operations::get_equipment(&mut *conn, gym_id).await
}

pub async fn create(conn: &mut PgConnection, gym_id: Uuid, req: EquipmentRequest) -> Res<EquipmentItem> {
    db::operations::insert_equipment(&mut *conn, gym_id, to_upsert(req)?).await
}

pub async fn update(
    conn: &mut PgConnection,
    gym_id: Uuid,
    item_id: Uuid,
    req: EquipmentRequest,
) -> Res<EquipmentItem> {
    db::operations::update_equipment(&mut *conn, gym_id, item_id, to_upsert(req)?)
        .await?
        .ok_or_else(not_found)
}

pub async fn delete(conn: &mut PgConnection, gym_id: Uuid, item_id: Uuid) -> Res<()> {
    if !db::operations::delete_equipment(&mut *conn, gym_id, item_id).await? {
        return Err(not_found());
    }
    Ok(())
}
