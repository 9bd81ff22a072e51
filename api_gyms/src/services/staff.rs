use chrono::NaiveDate;
use common::error::{AppError, ErrorCode, Res};
use db::{
    dtos::{
        gym::MembershipCreateRequest,
        user::{NotificationCreateRequest, UserCreateRequest},
    },
    models::{
        gym::Gym,
        membership::{GymMembership, MembershipSettings, MembershipStatus},
        user::{AccountStatus, UserRole},
    },
};
use serde_json::json;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    dtos::member::{AddStaffRequest, UpdateStaffRequest},
    services::permissions,
};

/// Staff roles must be non-empty and exclude `owner` and `member`.
pub fn validate_staff_roles(roles: &[UserRole]) -> Res<Vec<UserRole>> {
    if roles.is_empty() {
        return Err(AppError::coded(ErrorCode::ValidationError, "At least one staff role is required"));
    }
    if roles.iter().any(|r| matches!(r, UserRole::Owner | UserRole::Member)) {
        return Err(AppError::coded(
            ErrorCode::ValidationError,
            "Staff roles cannot include owner or member",
        ));
    }
    let mut unique = Vec::with_capacity(roles.len());
    for role in roles {
        if !unique.contains(role) {
            unique.push(*role);
        }
    }
    Ok(unique)
}

/// Roles of a membership once its staff roles are replaced by `staff_roles`.
/// A `member` role is kept.
pub fn merge_roles(current: &[UserRole], staff_roles: &[UserRole]) -> Vec<UserRole> {
    let mut roles = staff_roles.to_vec();
    if current.contains(&UserRole::Member) {
        roles.push(UserRole::Member);
    }
    roles
}

pub async fn list_staff(conn: &mut PgConnection, gym_id: Uuid) -> Res<Vec<GymMembership>> {
    db::membership::get_staff_by_gym(&mut *conn, gym_id).await
}

/// Grants staff roles to the user with `req.email`, creating the account
/// or the membership when needed.
pub async fn add_staff(conn: &mut PgConnection, gym: &Gym, req: AddStaffRequest) -> Res<GymMembership> {
    let roles = validate_staff_roles(&req.roles)?;
    let email = req.email.trim().to_lowercase();

    let user = match db::user::find_user_by_email(&mut *conn, &email).await? {
        Some(user) => user,
        None => {
            let full_name = req
                .full_name
                .clone()
                .ok_or_else(|| AppError::coded(ErrorCode::ValidationError, "Full name is required"))?;
            db::user::insert_user(
                &mut *conn,
                UserCreateRequest {
                    email,
                    username: None,
                    full_name,
                    phone: None,
                    role: roles[0],
                    account_status: AccountStatus::PendingSetup,
                },
            )
            .await?
        }
    };

    let granted = req
        .permissions
        .unwrap_or_else(|| permissions::defaults_for_roles(&roles));

    let membership = match db::membership::find_membership(&mut *conn, gym.id, user.id).await? {
        Some(existing) if existing.roles.iter().any(|r| r.is_staff()) => {
            return Err(AppError::coded(
                ErrorCode::StaffAlreadyExists,
                "User is already a staff member of this gym",
            ));
        }
        Some(existing) => {
            let membership = db::membership::update_access(
                &mut *conn,
                existing.id,
                merge_roles(&existing.roles, &roles),
                granted,
                req.custom_permissions,
            )
            .await?;
            if membership.status != MembershipStatus::Active {
                db::membership::update_status(&mut *conn, membership.id, MembershipStatus::Active).await?
            } else {
                membership
            }
        }
        None => {
            db::membership::insert_membership(
                &mut *conn,
                MembershipCreateRequest {
                    user_id: user.id,
                    gym_id: gym.id,
                    roles,
                    status: MembershipStatus::Active,
                    subscription: None,
                    custom_permissions: req.custom_permissions,
                    permissions: granted,
                    settings: MembershipSettings::default(),
                },
            )
            .await?
        }
    };

    db::notification::insert_notification(
        &mut *conn,
        NotificationCreateRequest {
            user_id: user.id,
            key: "notifications.staff.added".to_string(),
            vars: json!({ "gymName": gym.name }),
        },
    )
    .await?;

    log::info!("User {} joined gym {} staff as {:?}", user.id, gym.id, membership.roles);
    Ok(membership)
}

async fn require_staff(conn: &mut PgConnection, gym_id: Uuid, membership_id: Uuid) -> Res<GymMembership> {
    let membership = db::membership::find_membership_by_id(&mut *conn, gym_id, membership_id)
        .await?
        .filter(|m| m.roles.iter().any(|r| r.is_staff()))
        .ok_or_else(|| AppError::NotFound("Staff member not found".to_string()))?;
    if membership.has_role(UserRole::Owner) {
        return Err(AppError::Forbidden("The gym owner cannot be modified".to_string()));
    }
    Ok(membership)
}

pub async fn update_staff(
    conn: &mut PgConnection,
    gym_id: Uuid,
    membership_id: Uuid,
    req: UpdateStaffRequest,
) -> Res<GymMembership> {
    let membership = require_staff(conn, gym_id, membership_id).await?;

    let roles = match &req.roles {
        Some(roles) => merge_roles(&membership.roles, &validate_staff_roles(roles)?),
        None => membership.roles.clone(),
    };
    let granted = match (req.permissions, &req.roles) {
        (Some(list), _) => list,
        (None, Some(_)) => permissions::defaults_for_roles(&roles),
        (None, None) => membership.permissions.clone(),
    };
    let custom = req
        .custom_permissions
        .or_else(|| membership.custom_permissions.as_ref().map(|c| c.0));

    db::membership::update_access(&mut *conn, membership.id, roles, granted, custom).await
}

/// Strips the staff roles. A membership that also holds `member` stays as
/// a plain member; otherwise it is canceled.
pub async fn remove_staff(
    conn: &mut PgConnection,
    gym_id: Uuid,
    membership_id: Uuid,
    today: NaiveDate,
) -> Res<GymMembership> {
    let membership = require_staff(conn, gym_id, membership_id).await?;

    if membership.has_role(UserRole::Member) {
        let updated = db::membership::update_access(
            &mut *conn,
            membership.id,
            vec![UserRole::Member],
            Vec::new(),
            None,
        )
        .await?;
        crate::services::gym::refresh_stats(conn, gym_id, today).await?;
        return Ok(updated);
    }

    db::membership::update_status(&mut *conn, membership.id, MembershipStatus::Canceled).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staff_roles_exclude_owner_and_member() {
        assert!(validate_staff_roles(&[]).is_err());
        assert!(validate_staff_roles(&[UserRole::Coach, UserRole::Owner]).is_err());
        assert!(validate_staff_roles(&[UserRole::Member]).is_err());
        assert_eq!(
            validate_staff_roles(&[UserRole::Coach, UserRole::Receptionist, UserRole::Coach]).unwrap(),
            vec![UserRole::Coach, UserRole::Receptionist]
        );
    }

    #[test]
    fn member_role_survives_staff_changes() {
        assert_eq!(
            merge_roles(&[UserRole::Member, UserRole::Coach], &[UserRole::Manager]),
            vec![UserRole::Manager, UserRole::Member]
        );
        assert_eq!(
            merge_roles(&[UserRole::Coach], &[UserRole::Security]),
            vec![UserRole::Security]
        );
    }
}
