use std::collections::HashMap;

use chrono::NaiveDate;
use common::error::{AppError, ErrorCode, Res};
use db::{
    dtos::{
        gym::MembershipCreateRequest,
        user::{NotificationCreateRequest, UserCreateRequest},
    },
    models::{
        gym::Gym,
        membership::{
            GymMembership, MemberSubscriptionStatus, MembershipSettings, MembershipStatus,
            SubscriptionInfo,
        },
        user::{AccountStatus, User, UserRole},
    },
};
use serde_json::json;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    dtos::member::{CreateMemberRequest, MemberSubscriptionRequest, MemberView, RenewRequest},
    services::{
        duration::{self, SubscriptionDuration},
        gym as gym_service,
    },
};

/// A renewal continues from the current end date while the subscription
/// still runs and restarts today once it lapsed.
pub fn renewal_start(current: Option<&SubscriptionInfo>, today: NaiveDate) -> NaiveDate {
    match current {
        Some(sub) if sub.end_date >= today => sub.end_date,
        _ => today,
    }
}

/// Membership status that matches a freshly written subscription.
pub fn status_for(subscription: Option<&SubscriptionInfo>, today: NaiveDate) -> MembershipStatus {
    match subscription {
        Some(sub) if sub.effective_status(today) == MemberSubscriptionStatus::Active => {
            MembershipStatus::Active
        }
        Some(_) => MembershipStatus::Expired,
        None => MembershipStatus::Pending,
    }
}

async fn build_subscription(
    conn: &mut PgConnection,
    gym_id: Uuid,
    type_id: Option<Uuid>,
    start_date: NaiveDate,
    preset: Option<&str>,
    payment_method: Option<String>,
) -> Res<SubscriptionInfo> {
    let end_date = match type_id {
        Some(type_id) => {
            let subscription_type = db::gym::find_subscription_type(&mut *conn, gym_id, type_id)
                .await?
                .filter(|t| t.is_active)
                .ok_or_else(|| AppError::NotFound("Subscription type not found".to_string()))?;
            SubscriptionDuration::of_type(&subscription_type)
                .end_date(start_date)
                .ok_or_else(|| AppError::BadRequest("Subscription end date out of range".to_string()))?
        }
        None => duration::end_date(start_date, preset)?,
    };

    Ok(SubscriptionInfo {
        type_id,
        start_date,
        end_date,
        status: MemberSubscriptionStatus::Active,
        payment_method,
    })
}

async fn require_member(conn: &mut PgConnection, gym_id: Uuid, membership_id: Uuid) -> Res<GymMembership> {
    db::membership::find_membership_by_id(&mut *conn, gym_id, membership_id)
        .await?
        .ok_or_else(|| AppError::coded(ErrorCode::MemberNotFound, "Member not found"))
}

/// Adds a member to `gym`, creating a `pending_setup` account when the
/// email is unknown.
pub async fn create_member(
    conn: &mut PgConnection,
    gym: &Gym,
    req: CreateMemberRequest,
    today: NaiveDate,
) -> Res<MemberView> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::coded(ErrorCode::ValidationError, "A valid email is required"));
    }

    let user = match db::user::find_user_by_email(&mut *conn, &email).await? {
        Some(user) => user,
        None => {
            db::user::insert_user(
                &mut *conn,
                UserCreateRequest {
                    email,
                    username: None,
                    full_name: req.full_name.trim().to_string(),
                    phone: req.phone,
                    role: UserRole::Member,
                    account_status: AccountStatus::PendingSetup,
                },
            )
            .await?
        }
    };

    if db::membership::find_membership(&mut *conn, gym.id, user.id).await?.is_some() {
        return Err(AppError::coded(
            ErrorCode::MemberAlreadyExists,
            "User is already a member of this gym",
        ));
    }

    let subscription = match req.subscription {
        Some(MemberSubscriptionRequest {
            type_id,
            start_date,
            duration,
            payment_method,
        }) => Some(
            build_subscription(
                conn,
                gym.id,
                type_id,
                start_date.unwrap_or(today),
                duration.as_deref(),
                payment_method,
            )
            .await?,
        ),
        None => None,
    };

    let membership = db::membership::insert_membership(
        &mut *conn,
        MembershipCreateRequest {
            user_id: user.id,
            gym_id: gym.id,
            roles: vec![UserRole::Member],
            status: status_for(subscription.as_ref(), today),
            subscription,
            custom_permissions: None,
            permissions: Vec::new(),
            settings: MembershipSettings::default(),
        },
    )
    .await?;

    db::notification::insert_notification(
        &mut *conn,
        NotificationCreateRequest {
            user_id: user.id,
            key: "notifications.membership.added".to_string(),
            vars: json!({ "gymName": gym.name }),
        },
    )
    .await?;

    gym_service::refresh_stats(conn, gym.id, today).await?;
    log::info!("Member {} added to gym {}", user.id, gym.id);

    Ok(MemberView {
        membership,
        user: Some(user),
    })
}

pub async fn get_member(conn: &mut PgConnection, gym_id: Uuid, membership_id: Uuid) -> Res<MemberView> {
    let membership = require_member(conn, gym_id, membership_id).await?;
    let user = db::user::get_user_by_id(&mut *conn, membership.user_id).await?;
    Ok(MemberView {
        membership,
        user: Some(user),
    })
}

/// Memberships holding the `member` role, joined with their users.
pub async fn list_members(
    conn: &mut PgConnection,
    gym_id: Uuid,
    status: Option<MembershipStatus>,
) -> Res<Vec<MemberView>> {
    let memberships = db::membership::get_memberships_by_gym(&mut *conn, gym_id, status).await?;
    let mut users: HashMap<Uuid, User> = db::membership::get_member_users(&mut *conn, gym_id)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    Ok(memberships
        .into_iter()
        .filter(|m| m.has_role(UserRole::Member))
        .map(|membership| MemberView {
            user: users.remove(&membership.user_id),
            membership,
        })
        .collect())
}

pub async fn set_status(
    conn: &mut PgConnection,
    gym_id: Uuid,
    membership_id: Uuid,
    status: MembershipStatus,
    today: NaiveDate,
) -> Res<GymMembership> {
    let membership = require_member(conn, gym_id, membership_id).await?;
    if membership.has_role(UserRole::Owner) {
        return Err(AppError::Forbidden("The owner membership cannot be changed".to_string()));
    }

    let membership = db::membership::update_status(&mut *conn, membership.id, status).await?;
    gym_service::refresh_stats(conn, gym_id, today).await?;
    log::info!("Membership {} set to {:?}", membership.id, status);
    Ok(membership)
}

/// Soft delete: the membership is kept as `canceled`.
pub async fn remove_member(
    conn: &mut PgConnection,
    gym_id: Uuid,
    membership_id: Uuid,
    today: NaiveDate,
) -> Res<GymMembership> {
    set_status(conn, gym_id, membership_id, MembershipStatus::Canceled, today).await
}

pub async fn renew(
    conn: &mut PgConnection,
    gym: &Gym,
    membership_id: Uuid,
    req: RenewRequest,
    today: NaiveDate,
) -> Res<GymMembership> {
    let membership = require_member(conn, gym.id, membership_id).await?;
    if membership.status == MembershipStatus::Banned {
        return Err(AppError::coded(
            ErrorCode::MembershipInactive,
            "Banned members cannot be renewed",
        ));
    }

    let current = membership.subscription.as_ref().map(|s| &s.0);
    let start_date = req.start_date.unwrap_or_else(|| renewal_start(current, today));
    let type_id = req.type_id.or_else(|| current.and_then(|s| s.type_id));
    let payment_method = req
        .payment_method
        .or_else(|| current.and_then(|s| s.payment_method.clone()));

    let subscription = build_subscription(
        conn,
        gym.id,
        type_id,
        start_date,
        req.duration.as_deref(),
        payment_method,
    )
    .await?;
    let status = status_for(Some(&subscription), today);
    let membership =
        db::membership::update_subscription(&mut *conn, membership.id, subscription, status).await?;

    db::notification::insert_notification(
        &mut *conn,
        NotificationCreateRequest {
            user_id: membership.user_id,
            key: "notifications.membership.renewed".to_string(),
            vars: json!({ "gymName": gym.name }),
        },
    )
    .await?;

    gym_service::refresh_stats(conn, gym.id, today).await?;
    Ok(membership)
}

pub async fn update_my_settings(
    conn: &mut PgConnection,
    user_id: Uuid,
    gym_id: Uuid,
    settings: MembershipSettings,
) -> Res<GymMembership> {
    let membership = db::membership::find_membership(&mut *conn, gym_id, user_id)
        .await?
        .ok_or_else(|| AppError::coded(ErrorCode::MemberNotFound, "Membership not found"))?;
    db::membership::update_settings(&mut *conn, membership.id, settings).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn sub(end_date: NaiveDate, status: MemberSubscriptionStatus) -> SubscriptionInfo {
        SubscriptionInfo {
            type_id: None,
            start_date: date(1, 1),
            end_date,
            status,
            payment_method: None,
        }
    }

    #[test]
    fn renewal_continues_a_running_subscription() {
        let running = sub(date(3, 20), MemberSubscriptionStatus::Active);
        assert_eq!(renewal_start(Some(&running), date(3, 10)), date(3, 20));
        assert_eq!(renewal_start(Some(&running), date(3, 20)), date(3, 20));
    }

    #[test]
    fn renewal_restarts_after_lapse() {
        let lapsed = sub(date(2, 28), MemberSubscriptionStatus::Active);
        assert_eq!(renewal_start(Some(&lapsed), date(3, 10)), date(3, 10));
        assert_eq!(renewal_start(None, date(3, 10)), date(3, 10));
    }

    #[test]
    fn status_follows_subscription() {
        let today = date(3, 10);
        assert_eq!(
            status_for(Some(&sub(date(4, 10), MemberSubscriptionStatus::Active)), today),
            MembershipStatus::Active
        );
        assert_eq!(
            status_for(Some(&sub(date(3, 1), MemberSubscriptionStatus::Active)), today),
            MembershipStatus::Expired
        );
        assert_eq!(
            status_for(Some(&sub(date(4, 10), MemberSubscriptionStatus::Cancelled)), today),
            MembershipStatus::Expired
        );
        assert_eq!(status_for(None, today), MembershipStatus::Pending);
    }
}
