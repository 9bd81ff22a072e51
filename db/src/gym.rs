use common::error::{AppError, Res};
use sqlx::{Executor, Postgres, types::Json};
use uuid::Uuid;

use crate::{
    dtos::gym::{GymCreateRequest, SubscriptionTypeCreateRequest},
    models::{
        gym::{Gym, GymSettings, GymStats},
        membership::SubscriptionType,
    },
};

pub async fn insert_gym<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: GymCreateRequest,
) -> Res<Gym> {
    sqlx::query_as::<_, Gym>(
        r#"
        INSERT INTO gyms (owner_id, name, slug, address, city, country, currency, settings)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(data.owner_id)
    .bind(data.name)
    .bind(data.slug)
    .bind(data.address)
    .bind(data.city)
    .bind(data.country)
    .bind(data.currency)
    .bind(Json(data.settings))
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn find_gym_by_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    gym_id: Uuid,
) -> Res<Option<Gym>> {
    sqlx::query_as::<_, Gym>("SELECT * FROM gyms WHERE id = $1")
        .bind(gym_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn exists_slug<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    slug: &str,
) -> Res<bool> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM gyms WHERE slug = $1)")
        .bind(slug)
        .fetch_one(executor)
        .await
        .map_err(AppError::from)
}

/// Gyms the user owns or holds an active membership in.
pub async fn get_gyms_for_user<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Vec<Gym>> {
    sqlx::query_as::<_, Gym>(
        r#"
        SELECT DISTINCT g.* FROM gyms g
        LEFT JOIN gym_memberships m ON m.gym_id = g.id AND m.user_id = $1
        WHERE g.owner_id = $1 OR m.status = 'active'
        ORDER BY g.created_at
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn count_owned_gyms<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    owner_id: Uuid,
) -> Res<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM gyms WHERE owner_id = $1")
        .bind(owner_id)
        .fetch_one(executor)
        .await
        .map_err(AppError::from)
}

pub async fn update_gym<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    gym_id: Uuid,
    name: Option<String>,
    address: Option<String>,
    city: Option<String>,
    settings: Option<GymSettings>,
) -> Res<Gym> {
    sqlx::query_as::<_, Gym>(
        r#"
        UPDATE gyms SET
            name = COALESCE($2, name),
            address = COALESCE($3, address),
            city = COALESCE($4, city),
            settings = COALESCE($5, settings),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(gym_id)
    .bind(name)
    .bind(address)
    .bind(city)
    .bind(settings.map(Json))
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn update_gym_stats<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    gym_id: Uuid,
    stats: GymStats,
) -> Res<()> {
    sqlx::query(
        r#"
        UPDATE gyms SET
            total_members = $2,
            active_members = $3,
            expired_members = $4,
            pending_members = $5,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(gym_id)
    .bind(stats.total_members)
    .bind(stats.active_members)
    .bind(stats.expired_members)
    .bind(stats.pending_members)
    .execute(executor)
    .await?;
    Ok(())
}

// === SUBSCRIPTION TYPES ===

pub async fn insert_subscription_type<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: SubscriptionTypeCreateRequest,
) -> Res<SubscriptionType> {
    sqlx::query_as::<_, SubscriptionType>(
        r#"
        INSERT INTO subscription_types (gym_id, name, description, duration, unit, price)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(data.gym_id)
    .bind(data.name)
    .bind(data.description)
    .bind(data.duration)
    .bind(data.unit)
    .bind(data.price)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_subscription_types<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    gym_id: Uuid,
) -> Res<Vec<SubscriptionType>> {
    sqlx::query_as::<_, SubscriptionType>(
        "SELECT * FROM subscription_types WHERE gym_id = $1 AND is_active ORDER BY price",
    )
    .bind(gym_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn find_subscription_type<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    gym_id: Uuid,
    type_id: Uuid,
) -> Res<Option<SubscriptionType>> {
    sqlx::query_as::<_, SubscriptionType>(
        "SELECT * FROM subscription_types WHERE id = $1 AND gym_id = $2",
    )
    .bind(type_id)
    .bind(gym_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn update_subscription_type<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    gym_id: Uuid,
    type_id: Uuid,
    name: Option<String>,
    description: Option<String>,
    price: Option<i64>,
) -> Res<Option<SubscriptionType>> {
    sqlx::query_as::<_, SubscriptionType>(
        r#"
        UPDATE subscription_types SET
            name = COALESCE($3, name),
            description = COALESCE($4, description),
            price = COALESCE($5, price)
        WHERE id = $1 AND gym_id = $2
        RETURNING *
        "#,
    )
    .bind(type_id)
    .bind(gym_id)
    .bind(name)
    .bind(description)
    .bind(price)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

/// Soft delete; existing memberships keep referencing the tier.
pub async fn deactivate_subscription_type<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    gym_id: Uuid,
    type_id: Uuid,
) -> Res<bool> {
    let result = sqlx::query(
        "UPDATE subscription_types SET is_active = FALSE WHERE id = $1 AND gym_id = $2",
    )
    .bind(type_id)
    .bind(gym_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}
