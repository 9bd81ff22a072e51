use common::error::{AppError, Res};
use sqlx::{Executor, Postgres, types::Json};
use uuid::Uuid;

use crate::{
    dtos::gym::MembershipCreateRequest,
    models::{
        membership::{
            CustomPermissions, GymMembership, GymPermission, MembershipSettings, MembershipStatus,
            SubscriptionInfo,
        },
        user::{User, UserRole},
    },
};

pub async fn insert_membership<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: MembershipCreateRequest,
) -> Res<GymMembership> {
    sqlx::query_as::<_, GymMembership>(
        r#"
        INSERT INTO gym_memberships
            (user_id, gym_id, roles, status, subscription, custom_permissions, permissions, settings)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(data.user_id)
    .bind(data.gym_id)
    .bind(data.roles)
    .bind(data.status)
    .bind(data.subscription.map(Json))
    .bind(data.custom_permissions.map(Json))
    .bind(data.permissions)
    .bind(Json(data.settings))
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn find_membership<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    gym_id: Uuid,
    user_id: Uuid,
) -> Res<Option<GymMembership>> {
    sqlx::query_as::<_, GymMembership>(
        "SELECT * FROM gym_memberships WHERE gym_id = $1 AND user_id = $2",
    )
    .bind(gym_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn find_membership_by_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    gym_id: Uuid,
    membership_id: Uuid,
) -> Res<Option<GymMembership>> {
    sqlx::query_as::<_, GymMembership>(
        "SELECT * FROM gym_memberships WHERE gym_id = $1 AND id = $2",
    )
    .bind(gym_id)
    .bind(membership_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_memberships_by_gym<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    gym_id: Uuid,
    status: Option<MembershipStatus>,
) -> Res<Vec<GymMembership>> {
    sqlx::query_as::<_, GymMembership>(
        r#"
        SELECT * FROM gym_memberships
        WHERE gym_id = $1 AND ($2::membership_status IS NULL OR status = $2)
        ORDER BY joined_at DESC
        "#,
    )
    .bind(gym_id)
    .bind(status)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

/// Memberships with a role other than `member`.
pub async fn get_staff_by_gym<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    gym_id: Uuid,
) -> Res<Vec<GymMembership>> {
    sqlx::query_as::<_, GymMembership>(
        r#"
        SELECT * FROM gym_memberships
        WHERE gym_id = $1 AND roles && ARRAY['owner', 'manager', 'receptionist', 'coach',
            'cleaner', 'maintenance', 'security']::user_role[]
        ORDER BY joined_at
        "#,
    )
    .bind(gym_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_memberships_by_user<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Vec<GymMembership>> {
    sqlx::query_as::<_, GymMembership>(
        "SELECT * FROM gym_memberships WHERE user_id = $1 ORDER BY joined_at DESC",
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_member_users<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    gym_id: Uuid,
) -> Res<Vec<User>> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT u.* FROM users u
        JOIN gym_memberships m ON m.user_id = u.id
        WHERE m.gym_id = $1
        "#,
    )
    .bind(gym_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn update_status<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    membership_id: Uuid,
    status: MembershipStatus,
) -> Res<GymMembership> {
    sqlx::query_as::<_, GymMembership>(
        "UPDATE gym_memberships SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(membership_id)
    .bind(status)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn update_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    membership_id: Uuid,
    subscription: SubscriptionInfo,
    status: MembershipStatus,
) -> Res<GymMembership> {
    sqlx::query_as::<_, GymMembership>(
        r#"
        UPDATE gym_memberships SET subscription = $2, status = $3, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(membership_id)
    .bind(Json(subscription))
    .bind(status)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn update_access<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    membership_id: Uuid,
    roles: Vec<UserRole>,
    permissions: Vec<GymPermission>,
    custom_permissions: Option<CustomPermissions>,
) -> Res<GymMembership> {
    sqlx::query_as::<_, GymMembership>(
        r#"
        UPDATE gym_memberships SET
            roles = $2, permissions = $3, custom_permissions = $4, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(membership_id)
    .bind(roles)
    .bind(permissions)
    .bind(custom_permissions.map(Json))
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn update_settings<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    membership_id: Uuid,
    settings: MembershipSettings,
) -> Res<GymMembership> {
    sqlx::query_as::<_, GymMembership>(
        "UPDATE gym_memberships SET settings = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(membership_id)
    .bind(Json(settings))
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}
