use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use sqlx::{Executor, Postgres, types::Json};
use uuid::Uuid;

use crate::{
    dtos::billing::{AppSubscriptionCreateRequest, HistoryCreateRequest},
    models::billing::{
        AppPlan, AppSubscription, AppSubscriptionHistory, HistoryAction, SoftGracePeriod,
        TrialInfo,
    },
};

// === PLANS ===

pub async fn get_plans<'e, E: Executor<'e, Database = Postgres>>(executor: E) -> Res<Vec<AppPlan>> {
    sqlx::query_as::<_, AppPlan>("SELECT * FROM app_plans ORDER BY plan_order")
        .fetch_all(executor)
        .await
        .map_err(AppError::from)
}

pub async fn find_plan<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    plan_id: &str,
) -> Res<Option<AppPlan>> {
    sqlx::query_as::<_, AppPlan>("SELECT * FROM app_plans WHERE plan_id = $1")
        .bind(plan_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

// === SUBSCRIPTIONS ===

pub async fn insert_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: AppSubscriptionCreateRequest,
) -> Res<AppSubscription> {
    sqlx::query_as::<_, AppSubscription>(
        r#"
        INSERT INTO app_subscriptions (
            user_id, plan_id, status, billing_cycle, start_date,
            current_period_start, current_period_end, auto_renew, auto_renew_type,
            payment_method, provider, trial, last_payment_date, next_payment_date
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING *
        "#,
    )
    .bind(data.user_id)
    .bind(data.plan_id)
    .bind(data.status)
    .bind(data.billing_cycle)
    .bind(data.start_date)
    .bind(data.current_period_start)
    .bind(data.current_period_end)
    .bind(data.auto_renew)
    .bind(data.auto_renew_type)
    .bind(data.payment_method)
    .bind(data.provider)
    .bind(data.trial.map(Json))
    .bind(data.last_payment_date)
    .bind(data.next_payment_date)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

/// Newest subscription that is still `active` or `trialing`.
pub async fn find_current_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Option<AppSubscription>> {
    sqlx::query_as::<_, AppSubscription>(
        r#"
        SELECT * FROM app_subscriptions
        WHERE user_id = $1 AND status IN ('active', 'trialing')
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

/// Newest subscription regardless of status.
pub async fn find_latest_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Option<AppSubscription>> {
    sqlx::query_as::<_, AppSubscription>(
        "SELECT * FROM app_subscriptions WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn find_by_provider_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    provider_subscription_id: &str,
) -> Res<Option<AppSubscription>> {
    sqlx::query_as::<_, AppSubscription>(
        "SELECT * FROM app_subscriptions WHERE provider_subscription_id = $1",
    )
    .bind(provider_subscription_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn has_used_trial<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<bool> {
    sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM app_subscriptions
            WHERE user_id = $1 AND (trial->>'hasUsedTrial')::boolean
        )
        "#,
    )
    .bind(user_id)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

/// Ends every `active`/`trialing` subscription of the user at `now`.
pub async fn cancel_current_subscriptions<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Res<u64> {
    let result = sqlx::query(
        r#"
        UPDATE app_subscriptions SET
            status = 'cancelled',
            end_date = GREATEST($2, start_date),
            cancelled_at = $2,
            auto_renew = FALSE,
            next_payment_date = NULL,
            updated_at = $2
        WHERE user_id = $1 AND status IN ('active', 'trialing')
        "#,
    )
    .bind(user_id)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// Writes back every mutable lifecycle field of a subscription.
pub async fn save_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    sub: &AppSubscription,
) -> Res<AppSubscription> {
    sqlx::query_as::<_, AppSubscription>(
        r#"
        UPDATE app_subscriptions SET
            plan_id = $2,
            status = $3,
            billing_cycle = $4,
            end_date = $5,
            current_period_start = $6,
            current_period_end = $7,
            auto_renew = $8,
            auto_renew_type = $9,
            provider_subscription_id = $10,
            trial = $11,
            soft_grace_period = $12,
            cancel_at_period_end = $13,
            cancelled_at = $14,
            cancellation_reason = $15,
            pending_plan_id = $16,
            pending_billing_cycle = $17,
            pending_change_effective_date = $18,
            last_payment_date = $19,
            next_payment_date = $20,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(sub.id)
    .bind(&sub.plan_id)
    .bind(sub.status)
    .bind(sub.billing_cycle)
    .bind(sub.end_date)
    .bind(sub.current_period_start)
    .bind(sub.current_period_end)
    .bind(sub.auto_renew)
    .bind(sub.auto_renew_type)
    .bind(&sub.provider_subscription_id)
    .bind(sub.trial.as_ref().map(|t| Json::<TrialInfo>(t.0)))
    .bind(sub.soft_grace_period.as_ref().map(|g| Json::<SoftGracePeriod>(g.0)))
    .bind(sub.cancel_at_period_end)
    .bind(sub.cancelled_at)
    .bind(&sub.cancellation_reason)
    .bind(&sub.pending_plan_id)
    .bind(sub.pending_billing_cycle)
    .bind(sub.pending_change_effective_date)
    .bind(sub.last_payment_date)
    .bind(sub.next_payment_date)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

// === HISTORY ===

pub async fn insert_history<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: HistoryCreateRequest,
) -> Res<AppSubscriptionHistory> {
    sqlx::query_as::<_, AppSubscriptionHistory>(
        r#"
        INSERT INTO app_subscription_history (
            user_id, subscription_id, plan_id, previous_plan_id, action,
            status, billing_cycle, amount_paid, currency, details
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(data.user_id)
    .bind(data.subscription_id)
    .bind(data.plan_id)
    .bind(data.previous_plan_id)
    .bind(data.action)
    .bind(data.status)
    .bind(data.billing_cycle)
    .bind(data.amount_paid)
    .bind(data.currency)
    .bind(data.details)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_history<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Vec<AppSubscriptionHistory>> {
    sqlx::query_as::<_, AppSubscriptionHistory>(
        "SELECT * FROM app_subscription_history WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

/// Number of history entries with `action` written since `since`.
pub async fn count_actions_since<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    action: HistoryAction,
    since: DateTime<Utc>,
) -> Res<i64> {
    sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM app_subscription_history
        WHERE user_id = $1 AND action = $2 AND created_at >= $3
        "#,
    )
    .bind(user_id)
    .bind(action)
    .bind(since)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub fn history_entry(
    sub: &AppSubscription,
    action: HistoryAction,
    previous_plan_id: Option<String>,
    amount_paid: i64,
    currency: Option<String>,
    details: Option<String>,
) -> HistoryCreateRequest {
    HistoryCreateRequest {
        user_id: sub.user_id,
        subscription_id: sub.id,
        plan_id: sub.plan_id.clone(),
        previous_plan_id,
        action,
        status: sub.status,
        billing_cycle: sub.billing_cycle,
        amount_paid,
        currency,
        details,
    }
}
