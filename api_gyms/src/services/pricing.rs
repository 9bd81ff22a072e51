use common::error::{AppError, ErrorCode, Res};
use db::{dtos::gym::SubscriptionTypeCreateRequest, models::membership::SubscriptionType};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    dtos::gym::{CreateSubscriptionTypeRequest, UpdateSubscriptionTypeRequest},
    services::duration::{MAX_PRESET_AMOUNT, SubscriptionDuration},
};

fn not_found() -> AppError {
    AppError::NotFound("Subscription type not found".to_string())
}

/// Cheapest active tier selling exactly `duration`.
pub fn find_tier(types: &[SubscriptionType], duration: SubscriptionDuration) -> Option<&SubscriptionType> {
    types
        .iter()
        .filter(|t| t.is_active && SubscriptionDuration::of_type(t) == duration)
        .min_by_key(|t| t.price)
}

pub async fn list_types(conn: &mut PgConnection, gym_id: Uuid) -> Res<Vec<SubscriptionType>> {
    db::gym::get_subscription_types(&mut *conn, gym_id).await
}

pub fn validate_type(req: &CreateSubscriptionTypeRequest) -> Res<()> {
    if req.name.trim().is_empty() {
        return Err(AppError::coded(ErrorCode::ValidationError, "Name is required"));
    }
    if !(1..=MAX_PRESET_AMOUNT as i32).contains(&req.duration) || req.price < 0 {
        return Err(AppError::coded(
            ErrorCode::ValidationError,
            format!(
                "Duration must be between 1 and {} and price cannot be negative",
                MAX_PRESET_AMOUNT
            ),
        ));
    }
    Ok(())
}

pub async fn create_type(
    conn: &mut PgConnection,
    gym_id: Uuid,
    req: CreateSubscriptionTypeRequest,
) -> Res<SubscriptionType> {
    validate_type(&req)?;

    db::gym::insert_subscription_type(
        &mut *conn,
        SubscriptionTypeCreateRequest {
            gym_id,
            name: req.name.trim().to_string(),
            description: req.description,
            duration: req.duration,
            unit: req.unit,
            price: req.price,
        },
    )
    .await
}

pub async fn update_type(
    conn: &mut PgConnection,
    gym_id: Uuid,
    type_id: Uuid,
    req: UpdateSubscriptionTypeRequest,
) -> Res<SubscriptionType> {
    if req.price.is_some_and(|p| p < 0) {
        return Err(AppError::coded(ErrorCode::ValidationError, "Price cannot be negative"));
    }
    db::gym::update_subscription_type(&mut *conn, gym_id, type_id, req.name, req.description, req.price)
        .await?
        .ok_or_else(not_found)
}

/// Types are deactivated, not deleted: memberships keep pointing at them.
pub async fn deactivate_type(conn: &mut PgConnection, gym_id: Uuid, type_id: Uuid) -> Res<()> {
    if !db::gym::deactivate_subscription_type(&mut *conn, gym_id, type_id).await? {
        return Err(not_found());
    }
    Ok(())
}

pub async fn lookup_tier(conn: &mut PgConnection, gym_id: Uuid, preset: &str) -> Res<SubscriptionType> {
    let duration = SubscriptionDuration::parse(preset).ok_or_else(|| {
        AppError::coded(ErrorCode::ValidationError, format!("Unknown duration '{}'", preset))
    })?;
    let types = list_types(conn, gym_id).await?;
    find_tier(&types, duration).cloned().ok_or_else(not_found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use db::models::membership::DurationUnit;

    fn tier(duration: i32, unit: DurationUnit, price: i64, is_active: bool) -> SubscriptionType {
        SubscriptionType {
            id: Uuid::new_v4(),
            gym_id: Uuid::nil(),
            name: format!("{}-{:?}", duration, unit),
            description: None,
            duration,
            unit,
            price,
            is_active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn finds_the_cheapest_active_tier() {
        let types = vec![
            tier(1, DurationUnit::Month, 3_000_00, true),
            tier(3, DurationUnit::Month, 8_000_00, true),
            tier(3, DurationUnit::Month, 7_500_00, false),
            tier(3, DurationUnit::Month, 7_900_00, true),
        ];
        let three_months = SubscriptionDuration::parse("3_months").unwrap();
        assert_eq!(find_tier(&types, three_months).map(|t| t.price), Some(7_900_00));

        let one_year = SubscriptionDuration::parse("1_year").unwrap();
        assert!(find_tier(&types, one_year).is_none());
    }

    #[test]
    fn tier_durations_are_bounded() {
        let request = |duration| CreateSubscriptionTypeRequest {
            name: "Annual".to_string(),
            description: None,
            duration,
            unit: DurationUnit::Year,
            price: 30_000_00,
        };
        assert!(validate_type(&request(1)).is_ok());
        assert!(validate_type(&request(0)).is_err());
        let err = validate_type(&request(400_000_000)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }
}
