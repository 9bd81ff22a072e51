use chrono::{DateTime, Utc};
use common::error::{AppError, ErrorCode, Res};
use db::models::user::{User, UserRole};
use sqlx::PgConnection;
use uuid::Uuid;

use api_billing::services::subscription;
use api_gyms::services::gym;

use crate::dtos::user::{OnboardingRequest, OnboardingResponse};

pub async fn get_user_by_id(conn: &mut PgConnection, user_id: Uuid) -> Res<User> {
    db::user::get_user_by_id(&mut *conn, user_id)
        .await
        .map_err(|e| match e {
            AppError::Database(sqlx::Error::RowNotFound) => {
                AppError::coded(ErrorCode::UserNotFound, "User not found")
            }
            other => other,
        })
}

/// Completes first-run setup. Owners create their first gym; every user
/// without an app subscription is placed on the free plan.
pub async fn onboard(
    conn: &mut PgConnection,
    user_id: Uuid,
    req: OnboardingRequest,
    now: DateTime<Utc>,
) -> Res<OnboardingResponse> {
    let user = get_user_by_id(conn, user_id).await?;
    if user.is_onboarded {
        return Err(AppError::Conflict("User is already onboarded".to_string()));
    }

    let created_gym = match (req.role, req.gym) {
        (UserRole::Owner, Some(gym_req)) => Some(gym::create_gym(conn, user_id, gym_req).await?),
        (UserRole::Owner, None) => {
            return Err(AppError::coded(
                ErrorCode::ValidationError,
                "Owners must provide a gym to create",
            ));
        }
        (UserRole::Member | UserRole::Coach, _) => None,
        (_, _) => {
            return Err(AppError::coded(
                ErrorCode::ValidationError,
                "Staff roles are granted by a gym, not chosen at onboarding",
            ));
        }
    };

    let free_plan = match user.app_subscription_id {
        Some(_) => None,
        None => Some(subscription::start_free_plan(conn, user_id, now).await?),
    };

    let user = db::user::mark_onboarded(&mut *conn, user_id, req.role).await?;
    log::info!("User {} onboarded as {:?}", user.id, user.role);

    Ok(OnboardingResponse {
        user,
        gym: created_gym,
        subscription: free_plan,
    })
}
