//! App subscription lifecycle.
//!
//! Every function takes a connection so routes can run multi-step changes
//! inside one transaction.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use common::error::{AppError, ErrorCode, Res};
use db::{
    billing::history_entry,
    dtos::{billing::AppSubscriptionCreateRequest, user::NotificationCreateRequest},
    models::billing::{
        AppPlan, AppSubscription, AppSubscriptionHistory, AppSubscriptionStatus, AutoRenewType,
        BillingCycle, HistoryAction, PlanLevel, PlanType, TrialInfo,
    },
};
use serde::Serialize;
use serde_json::json;
use sqlx::{PgConnection, types::Json};
use uuid::Uuid;

use crate::{
    dtos::sub::{DowngradeRequest, SubscribeRequest},
    services::{
        blocker::{self, BlockerConfig},
        plan,
        plan_change::{self, DuePlanChange, PlanChange, PlanPosition, SubscriptionDates},
        status::{self, Resolution},
    },
};

pub const DEFAULT_TRIAL_DAYS: i64 = 14;
pub const MAX_DAILY_CANCELLATIONS: i64 = 3;
pub const DEFAULT_CURRENCY: &str = "DZD";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    pub subscription: AppSubscription,
    pub plan: AppPlan,
    pub resolution: Resolution,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeOutcome {
    pub subscription: AppSubscription,
    pub amount_paid: i64,
    pub proration_credit: i64,
    pub currency: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryView {
    #[serde(flatten)]
    pub entry: AppSubscriptionHistory,
    pub plan: Option<AppPlan>,
}

async fn require_current(conn: &mut PgConnection, user_id: Uuid, now: DateTime<Utc>) -> Res<AppSubscription> {
    let sub = db::billing::find_current_subscription(&mut *conn, user_id)
        .await?
        .ok_or_else(|| {
            AppError::coded(ErrorCode::NoActiveSubscription, "No active subscription found")
        })?;
    apply_due_change(conn, sub, now).await
}

/// Applies a scheduled downgrade or switch whose effective date has passed.
async fn apply_due_change(
    conn: &mut PgConnection,
    mut sub: AppSubscription,
    now: DateTime<Utc>,
) -> Res<AppSubscription> {
    let Some(due) = plan_change::due_plan_change(&sub, now) else {
        return Ok(sub);
    };

    let target = plan::get_plan(&mut *conn, &due.plan_id).await?;
    let dates = plan_change::subscription_dates(due.effective, due.cycle, target.plan_type, target.level);
    let previous_plan_id = apply_plan_change(&mut sub, due, dates);

    let saved = db::billing::save_subscription(&mut *conn, &sub).await?;
    db::billing::insert_history(
        &mut *conn,
        history_entry(
            &saved,
            HistoryAction::Downgraded,
            Some(previous_plan_id.clone()),
            0,
            None,
            Some(format!("Scheduled change from {} to {} applied", previous_plan_id, target.name)),
        ),
    )
    .await?;

    log::info!(
        "Applied pending plan change for user {}: {} -> {}",
        saved.user_id,
        previous_plan_id,
        saved.plan_id
    );
    Ok(saved)
}

/// Moves `sub` onto the plan of a due change, starting a new period at the
/// effective date. Returns the previous plan id.
pub fn apply_plan_change(sub: &mut AppSubscription, due: DuePlanChange, dates: SubscriptionDates) -> String {
    let previous_plan_id = std::mem::replace(&mut sub.plan_id, due.plan_id);
    sub.billing_cycle = due.cycle;
    sub.current_period_start = due.effective;
    sub.current_period_end = dates.period_end;
    sub.next_payment_date = dates.next_payment_date;
    sub.auto_renew = dates.next_payment_date.is_some();
    sub.pending_plan_id = None;
    sub.pending_billing_cycle = None;
    sub.pending_change_effective_date = None;
    sub.soft_grace_period = None;
    previous_plan_id
}

/// Turns a trial into a paid period starting `now`.
pub fn convert_trial_in_place(
    sub: &mut AppSubscription,
    cycle: BillingCycle,
    dates: SubscriptionDates,
    payment_method: Option<String>,
    now: DateTime<Utc>,
) {
    sub.status = AppSubscriptionStatus::Active;
    sub.billing_cycle = cycle;
    sub.current_period_start = now;
    sub.current_period_end = dates.period_end;
    sub.next_payment_date = dates.next_payment_date;
    sub.auto_renew = dates.next_payment_date.is_some();
    sub.last_payment_date = Some(now);
    sub.soft_grace_period = None;
    if payment_method.is_some() {
        sub.payment_method = payment_method;
    }
    if let Some(trial) = sub.trial.as_mut() {
        trial.0.converted_to_paid = true;
    }
}

/// Amount due for a new plan once the unused credit is deducted.
pub fn charged_amount(cost: i64, credit: i64) -> i64 {
    (cost - credit).max(0)
}

/// `recent` counts the user's cancellations over the last 24 hours.
pub fn ensure_cancellation_allowed(recent: i64) -> Res<()> {
    if recent >= MAX_DAILY_CANCELLATIONS {
        return Err(AppError::coded(
            ErrorCode::SubscriptionCancelLimitExceeded,
            format!(
                "Subscriptions can be cancelled at most {} times per day",
                MAX_DAILY_CANCELLATIONS
            ),
        ));
    }
    Ok(())
}

/// Schedules the end of `sub` and returns when access stops. A trial ends
/// with the trial, anything else with the current period.
pub fn schedule_cancellation(
    sub: &mut AppSubscription,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> Res<DateTime<Utc>> {
    if sub.cancel_at_period_end {
        return Err(AppError::Conflict(
            "Subscription is already scheduled for cancellation".to_string(),
        ));
    }
    let end = match sub.trial() {
        Some(trial) if sub.status == AppSubscriptionStatus::Trialing => trial.end_date,
        _ => sub.current_period_end,
    };
    sub.cancel_at_period_end = true;
    sub.cancelled_at = Some(now);
    sub.cancellation_reason = reason;
    sub.auto_renew = false;
    sub.next_payment_date = None;
    sub.pending_plan_id = None;
    sub.pending_billing_cycle = None;
    sub.pending_change_effective_date = None;
    sub.end_date = Some(end.max(sub.start_date));
    Ok(end)
}

/// Clears a scheduled cancellation. `recurring` says whether the plan bills
/// again, which restores auto renewal at the period end.
pub fn undo_cancellation(sub: &mut AppSubscription, recurring: bool, now: DateTime<Utc>) -> Res<()> {
    if !sub.cancel_at_period_end {
        return Err(AppError::BadRequest(
            "Subscription is not scheduled for cancellation".to_string(),
        ));
    }
    if now >= sub.end_date.unwrap_or(sub.current_period_end) {
        return Err(AppError::BadRequest(
            "Subscription has already ended, subscribe again instead".to_string(),
        ));
    }
    sub.cancel_at_period_end = false;
    sub.cancelled_at = None;
    sub.cancellation_reason = None;
    sub.end_date = None;
    sub.auto_renew = recurring;
    sub.next_payment_date = recurring.then_some(sub.current_period_end);
    Ok(())
}

async fn notify(conn: &mut PgConnection, user_id: Uuid, key: &str, vars: serde_json::Value) -> Res<()> {
    db::notification::insert_notification(
        &mut *conn,
        NotificationCreateRequest {
            user_id,
            key: key.to_string(),
            vars,
        },
    )
    .await?;
    Ok(())
}

/// Current subscription of the user with its plan and effective status.
/// Returns `None` when the user never subscribed or the last one ended.
pub async fn get_my_subscription(
    conn: &mut PgConnection,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Res<Option<SubscriptionView>> {
    let Some(sub) = db::billing::find_current_subscription(&mut *conn, user_id).await? else {
        return Ok(None);
    };
    let mut sub = apply_due_change(conn, sub, now).await?;

    let resolution = status::resolve(&sub, now);
    if let Some(grace) = resolution.grace_to_open {
        sub.soft_grace_period = Some(Json(grace));
        sub = db::billing::save_subscription(&mut *conn, &sub).await?;
        log::info!("Opened soft grace for subscription {}", sub.id);
    }

    let plan = plan::get_plan(&mut *conn, &sub.plan_id).await?;
    Ok(Some(SubscriptionView {
        subscription: sub,
        plan,
        resolution,
    }))
}

/// Subscribes the user to a plan, replacing any live subscription.
///
/// Downgrades and cycle switch-downs are refused here; they go through
/// [`downgrade`] and take effect at the end of the period. A trial on the
/// same plan is converted to paid in place.
pub async fn subscribe(
    conn: &mut PgConnection,
    user_id: Uuid,
    req: SubscribeRequest,
    now: DateTime<Utc>,
) -> Res<SubscribeOutcome> {
    let target = plan::get_plan(&mut *conn, &req.plan_id).await?;
    let cycle = match (target.plan_type, req.billing_cycle) {
        (PlanType::OneTime, _) => BillingCycle::OneTime,
        (PlanType::Subscription, BillingCycle::OneTime) => {
            return Err(AppError::BadRequest(format!(
                "Plan '{}' is not sold as a one-time purchase",
                target.plan_id
            )));
        }
        (PlanType::Subscription, cycle) => cycle,
    };

    let currency = req
        .currency
        .as_deref()
        .unwrap_or(DEFAULT_CURRENCY)
        .to_uppercase();
    let price = plan_change::plan_price(&target, &currency).ok_or_else(|| {
        AppError::BadRequest(format!("Plan '{}' is not sold in {}", target.plan_id, currency))
    })?;
    let cost = plan_change::plan_cost(target.plan_type, cycle, &price).ok_or_else(|| {
        AppError::BadRequest(format!("Plan '{}' has no price for this billing cycle", target.plan_id))
    })?;

    let current = match db::billing::find_current_subscription(&mut *conn, user_id).await? {
        Some(sub) => Some(apply_due_change(conn, sub, now).await?),
        None => None,
    };

    let mut credit = 0;
    let mut previous_plan_id = None;
    if let Some(current) = current {
        if current.status == AppSubscriptionStatus::Trialing && current.plan_id == target.plan_id {
            return convert_trial(conn, current, &target, cycle, cost, currency, req.payment_method, now).await;
        }

        let current_plan = plan::get_plan(&mut *conn, &current.plan_id).await?;
        let change = plan_change::classify_change(
            PlanPosition {
                plan_id: &current.plan_id,
                level: current_plan.level,
                cycle: current.billing_cycle,
            },
            PlanPosition {
                plan_id: &target.plan_id,
                level: target.level,
                cycle,
            },
        )?;
        if change.is_scheduled() {
            return Err(AppError::coded(
                ErrorCode::InvalidPlanChange,
                "Downgrades and billing cycle switch-downs must use the downgrade endpoint",
            ));
        }

        if current.status != AppSubscriptionStatus::Trialing {
            let old_price = plan_change::plan_price(&current_plan, &currency)
                .and_then(|p| plan_change::plan_cost(current_plan.plan_type, current.billing_cycle, &p))
                .unwrap_or(0);
            credit = plan_change::proration_credit(&current, old_price, now);
        }
        previous_plan_id = Some(current.plan_id);
    }

    db::billing::cancel_current_subscriptions(&mut *conn, user_id, now).await?;

    let dates = plan_change::subscription_dates(now, cycle, target.plan_type, target.level);
    let sub = db::billing::insert_subscription(
        &mut *conn,
        AppSubscriptionCreateRequest {
            user_id,
            plan_id: target.plan_id.clone(),
            status: AppSubscriptionStatus::Active,
            billing_cycle: cycle,
            start_date: now,
            current_period_start: now,
            current_period_end: dates.period_end,
            auto_renew: dates.next_payment_date.is_some(),
            auto_renew_type: AutoRenewType::Auto,
            payment_method: req.payment_method,
            provider: None,
            trial: None,
            last_payment_date: Some(now),
            next_payment_date: dates.next_payment_date,
        },
    )
    .await?;
    db::user::set_app_subscription(&mut *conn, user_id, sub.id).await?;

    let amount_paid = charged_amount(cost, credit);
    let (action, details) = match &previous_plan_id {
        Some(previous) => (
            HistoryAction::Upgraded,
            format!("Upgraded from {} to {}", previous, target.name),
        ),
        None => (HistoryAction::Created, format!("Subscribed to {}", target.name)),
    };
    db::billing::insert_history(
        &mut *conn,
        history_entry(&sub, action, previous_plan_id, amount_paid, Some(currency.clone()), Some(details)),
    )
    .await?;

    if target.level != PlanLevel::Free {
        let user = db::user::get_user_by_id(&mut *conn, user_id).await?;
        notify(
            conn,
            user_id,
            "subscription.created",
            json!({ "name": user.full_name, "planName": target.name }),
        )
        .await?;
    }

    log::info!(
        "User {} subscribed to {} ({} {}, credit {})",
        user_id,
        target.plan_id,
        amount_paid,
        currency,
        credit
    );

    Ok(SubscribeOutcome {
        subscription: sub,
        amount_paid,
        proration_credit: credit,
        currency,
    })
}

#[allow(clippy::too_many_arguments)]
async fn convert_trial(
    conn: &mut PgConnection,
    mut sub: AppSubscription,
    target: &AppPlan,
    cycle: BillingCycle,
    cost: i64,
    currency: String,
    payment_method: Option<String>,
    now: DateTime<Utc>,
) -> Res<SubscribeOutcome> {
    let dates = plan_change::subscription_dates(now, cycle, target.plan_type, target.level);
    convert_trial_in_place(&mut sub, cycle, dates, payment_method, now);

    let sub = db::billing::save_subscription(&mut *conn, &sub).await?;
    db::billing::insert_history(
        &mut *conn,
        history_entry(
            &sub,
            HistoryAction::TrialConverted,
            None,
            cost,
            Some(currency.clone()),
            Some(format!("Trial of {} converted to paid", target.name)),
        ),
    )
    .await?;

    log::info!("User {} converted trial of {} to paid", sub.user_id, target.plan_id);

    Ok(SubscribeOutcome {
        subscription: sub,
        amount_paid: cost,
        proration_credit: 0,
        currency,
    })
}

/// Starts the one trial a user is entitled to.
pub async fn start_trial(
    conn: &mut PgConnection,
    user_id: Uuid,
    plan_id: &str,
    now: DateTime<Utc>,
) -> Res<AppSubscription> {
    if db::billing::has_used_trial(&mut *conn, user_id).await? {
        return Err(AppError::coded(
            ErrorCode::TrialAlreadyUsed,
            "You have already used your free trial",
        ));
    }

    let target = plan::get_plan(&mut *conn, plan_id).await?;
    if target.level == PlanLevel::Free || target.plan_type == PlanType::OneTime {
        return Err(AppError::BadRequest(format!(
            "Plan '{}' does not offer a trial",
            target.plan_id
        )));
    }

    if let Some(current) = db::billing::find_current_subscription(&mut *conn, user_id).await? {
        let current_plan = plan::get_plan(&mut *conn, &current.plan_id).await?;
        if current_plan.level != PlanLevel::Free {
            return Err(AppError::coded(
                ErrorCode::AlreadySubscribed,
                "A trial cannot start while a paid subscription is active",
            ));
        }
    }

    db::billing::cancel_current_subscriptions(&mut *conn, user_id, now).await?;

    let days = target.trial_days.map(i64::from).unwrap_or(DEFAULT_TRIAL_DAYS);
    let trial_end = now + Duration::days(days);
    let sub = db::billing::insert_subscription(
        &mut *conn,
        AppSubscriptionCreateRequest {
            user_id,
            plan_id: target.plan_id.clone(),
            status: AppSubscriptionStatus::Trialing,
            billing_cycle: BillingCycle::Monthly,
            start_date: now,
            current_period_start: now,
            current_period_end: trial_end,
            auto_renew: false,
            auto_renew_type: AutoRenewType::Auto,
            payment_method: None,
            provider: None,
            trial: Some(TrialInfo {
                start_date: now,
                end_date: trial_end,
                has_used_trial: true,
                converted_to_paid: false,
            }),
            last_payment_date: None,
            next_payment_date: None,
        },
    )
    .await?;
    db::user::set_app_subscription(&mut *conn, user_id, sub.id).await?;

    db::billing::insert_history(
        &mut *conn,
        history_entry(
            &sub,
            HistoryAction::TrialStarted,
            None,
            0,
            None,
            Some(format!("{} day trial of {}", days, target.name)),
        ),
    )
    .await?;
    notify(
        conn,
        user_id,
        "subscription.trial_started",
        json!({ "planName": target.name, "days": days }),
    )
    .await?;

    log::info!("User {} started a {} day trial of {}", user_id, days, target.plan_id);
    Ok(sub)
}

/// Puts a freshly onboarded user on the free plan.
pub async fn start_free_plan(
    conn: &mut PgConnection,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Res<AppSubscription> {
    let free = db::billing::get_plans(&mut *conn)
        .await?
        .into_iter()
        .find(|p| p.level == PlanLevel::Free)
        .ok_or_else(|| AppError::coded(ErrorCode::PlanNotFound, "Free plan is not configured"))?;

    let dates = plan_change::subscription_dates(now, BillingCycle::Monthly, free.plan_type, free.level);
    let sub = db::billing::insert_subscription(
        &mut *conn,
        AppSubscriptionCreateRequest {
            user_id,
            plan_id: free.plan_id.clone(),
            status: AppSubscriptionStatus::Active,
            billing_cycle: BillingCycle::Monthly,
            start_date: now,
            current_period_start: now,
            current_period_end: dates.period_end,
            auto_renew: false,
            auto_renew_type: AutoRenewType::Auto,
            payment_method: None,
            provider: None,
            trial: None,
            last_payment_date: None,
            next_payment_date: None,
        },
    )
    .await?;
    db::user::set_app_subscription(&mut *conn, user_id, sub.id).await?;
    db::billing::insert_history(
        &mut *conn,
        history_entry(&sub, HistoryAction::Created, None, 0, None, Some("Free plan".to_string())),
    )
    .await?;

    Ok(sub)
}

/// Schedules a downgrade or cycle switch-down for the end of the current
/// period.
pub async fn downgrade(
    conn: &mut PgConnection,
    user_id: Uuid,
    req: DowngradeRequest,
    now: DateTime<Utc>,
) -> Res<AppSubscription> {
    let mut sub = require_current(conn, user_id, now).await?;
    if sub.has_pending_change() {
        return Err(AppError::coded(
            ErrorCode::PendingChangeExists,
            "A plan change is already scheduled",
        ));
    }

    let current_plan = plan::get_plan(&mut *conn, &sub.plan_id).await?;
    let target = plan::get_plan(&mut *conn, &req.plan_id).await?;
    let cycle = if target.plan_type == PlanType::OneTime {
        BillingCycle::OneTime
    } else {
        req.billing_cycle
    };

    let change = plan_change::classify_change(
        PlanPosition {
            plan_id: &sub.plan_id,
            level: current_plan.level,
            cycle: sub.billing_cycle,
        },
        PlanPosition {
            plan_id: &target.plan_id,
            level: target.level,
            cycle,
        },
    )?;
    if !change.is_scheduled() {
        return Err(AppError::coded(
            ErrorCode::InvalidPlanChange,
            "Upgrades take effect immediately, use the subscribe endpoint",
        ));
    }

    let effective = match sub.trial() {
        Some(trial) if sub.status == AppSubscriptionStatus::Trialing => trial.end_date,
        _ => sub.current_period_end,
    };
    sub.pending_plan_id = Some(target.plan_id.clone());
    sub.pending_billing_cycle = Some(cycle);
    sub.pending_change_effective_date = Some(effective);

    let sub = db::billing::save_subscription(&mut *conn, &sub).await?;
    let action = match change {
        PlanChange::SwitchDown => HistoryAction::SwitchScheduled,
        _ => HistoryAction::DowngradeScheduled,
    };
    db::billing::insert_history(
        &mut *conn,
        history_entry(
            &sub,
            action,
            None,
            0,
            None,
            Some(format!("Change to {} scheduled for {}", target.name, effective.to_rfc3339())),
        ),
    )
    .await?;

    log::info!(
        "User {} scheduled {} -> {} at {}",
        user_id,
        sub.plan_id,
        target.plan_id,
        effective
    );
    Ok(sub)
}

/// Cancels at the end of the current period.
pub async fn cancel(
    conn: &mut PgConnection,
    user_id: Uuid,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> Res<AppSubscription> {
    let recent = db::billing::count_actions_since(
        &mut *conn,
        user_id,
        HistoryAction::Cancelled,
        now - Duration::days(1),
    )
    .await?;
    ensure_cancellation_allowed(recent)?;

    let mut sub = require_current(conn, user_id, now).await?;
    let end = schedule_cancellation(&mut sub, reason, now)?;

    let sub = db::billing::save_subscription(&mut *conn, &sub).await?;
    db::billing::insert_history(
        &mut *conn,
        history_entry(
            &sub,
            HistoryAction::Cancelled,
            None,
            0,
            None,
            sub.cancellation_reason.clone(),
        ),
    )
    .await?;

    log::info!("User {} cancelled subscription {} effective {}", user_id, sub.id, end);
    Ok(sub)
}

/// Undoes a scheduled cancellation while the period is still running.
pub async fn reactivate(conn: &mut PgConnection, user_id: Uuid, now: DateTime<Utc>) -> Res<AppSubscription> {
    let mut sub = require_current(conn, user_id, now).await?;
    let plan = plan::get_plan(&mut *conn, &sub.plan_id).await?;
    let recurring = sub.status == AppSubscriptionStatus::Active
        && plan_change::is_recurring(plan.plan_type, sub.billing_cycle, plan.level);
    undo_cancellation(&mut sub, recurring, now)?;

    let sub = db::billing::save_subscription(&mut *conn, &sub).await?;
    db::billing::insert_history(
        &mut *conn,
        history_entry(&sub, HistoryAction::Reactivated, None, 0, None, None),
    )
    .await?;

    log::info!("User {} reactivated subscription {}", user_id, sub.id);
    Ok(sub)
}

/// Drops a scheduled downgrade or switch.
pub async fn cancel_pending_change(
    conn: &mut PgConnection,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Res<AppSubscription> {
    let mut sub = require_current(conn, user_id, now).await?;
    let Some(pending) = sub.pending_plan_id.take() else {
        return Err(AppError::coded(
            ErrorCode::NoPendingChange,
            "No plan change is scheduled",
        ));
    };
    sub.pending_billing_cycle = None;
    sub.pending_change_effective_date = None;

    let sub = db::billing::save_subscription(&mut *conn, &sub).await?;
    db::billing::insert_history(
        &mut *conn,
        history_entry(
            &sub,
            HistoryAction::PendingChangeCancelled,
            None,
            0,
            None,
            Some(format!("Scheduled change to {} cancelled", pending)),
        ),
    )
    .await?;
    Ok(sub)
}

/// History newest first, each entry with its plan when it still exists.
pub async fn history(conn: &mut PgConnection, user_id: Uuid) -> Res<Vec<HistoryView>> {
    let plans: HashMap<String, AppPlan> = db::billing::get_plans(&mut *conn)
        .await?
        .into_iter()
        .map(|p| (p.plan_id.clone(), p))
        .collect();

    let entries = db::billing::get_history(&mut *conn, user_id).await?;
    Ok(entries
        .into_iter()
        .map(|entry| HistoryView {
            plan: plans.get(&entry.plan_id).cloned(),
            entry,
        })
        .collect())
}

/// Modal the dashboard should show, persisting the grace window or the
/// expiry the decision asks for.
pub async fn blocker(conn: &mut PgConnection, user_id: Uuid, now: DateTime<Utc>) -> Res<Option<BlockerConfig>> {
    let Some(sub) = db::billing::find_latest_subscription(&mut *conn, user_id).await? else {
        return Ok(None);
    };
    let mut sub = match sub.status {
        AppSubscriptionStatus::Active | AppSubscriptionStatus::Trialing => {
            apply_due_change(conn, sub, now).await?
        }
        _ => sub,
    };

    let decision = blocker::blocker_config(&sub, now);
    if decision.grace_to_open.is_none() && !decision.mark_expired {
        return Ok(decision.config);
    }

    if let Some(grace) = decision.grace_to_open {
        sub.soft_grace_period = Some(Json(grace));
        log::info!("Opened soft grace for subscription {}", sub.id);
    }
    if decision.mark_expired {
        sub.status = AppSubscriptionStatus::Expired;
        sub.auto_renew = false;
        sub.next_payment_date = None;
    }

    let sub = db::billing::save_subscription(&mut *conn, &sub).await?;
    if decision.mark_expired {
        db::billing::insert_history(
            &mut *conn,
            history_entry(
                &sub,
                HistoryAction::Expired,
                None,
                0,
                None,
                Some("Grace period ended".to_string()),
            ),
        )
        .await?;
        log::warn!("Subscription {} expired after grace", sub.id);
    }

    Ok(decision.config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::status::tests::{at, subscription};
    use chrono::TimeZone;

    fn trialing() -> AppSubscription {
        let mut sub = subscription(at(1, 0), at(15, 0));
        sub.status = AppSubscriptionStatus::Trialing;
        sub.auto_renew = false;
        sub.next_payment_date = None;
        sub.trial = Some(Json(TrialInfo {
            start_date: at(1, 0),
            end_date: at(15, 0),
            has_used_trial: true,
            converted_to_paid: false,
        }));
        sub
    }

    #[test]
    fn fourth_cancellation_in_a_day_is_refused() {
        assert!(ensure_cancellation_allowed(0).is_ok());
        assert!(ensure_cancellation_allowed(MAX_DAILY_CANCELLATIONS - 1).is_ok());
        let err = ensure_cancellation_allowed(MAX_DAILY_CANCELLATIONS).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SubscriptionCancelLimitExceeded);
    }

    #[test]
    fn converting_a_trial_marks_it_paid() {
        let mut sub = trialing();
        let now = at(10, 12);
        let dates = plan_change::subscription_dates(now, BillingCycle::Yearly, PlanType::Subscription, PlanLevel::Pro);
        convert_trial_in_place(&mut sub, BillingCycle::Yearly, dates, Some("card".to_string()), now);

        assert_eq!(sub.status, AppSubscriptionStatus::Active);
        assert!(sub.trial().is_some_and(|t| t.converted_to_paid));
        assert_eq!(sub.current_period_start, now);
        assert_eq!(sub.current_period_end, Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap());
        assert_eq!(sub.next_payment_date, Some(sub.current_period_end));
        assert!(sub.auto_renew);
        assert_eq!(sub.last_payment_date, Some(now));
        assert_eq!(sub.payment_method.as_deref(), Some("card"));
    }

    #[test]
    fn due_pending_change_is_applied_lazily() {
        let mut sub = subscription(at(1, 0), at(31, 0));
        sub.pending_plan_id = Some("starter".to_string());
        sub.pending_billing_cycle = Some(BillingCycle::Monthly);
        sub.pending_change_effective_date = Some(at(31, 0));

        assert!(plan_change::due_plan_change(&sub, at(30, 23)).is_none());
        let due = plan_change::due_plan_change(&sub, at(31, 1)).unwrap();
        let dates = plan_change::subscription_dates(
            due.effective,
            due.cycle,
            PlanType::Subscription,
            PlanLevel::Starter,
        );
        let previous = apply_plan_change(&mut sub, due, dates);

        assert_eq!(previous, "pro");
        assert_eq!(sub.plan_id, "starter");
        assert_eq!(sub.current_period_start, at(31, 0));
        assert!(!sub.has_pending_change());
        assert!(sub.pending_billing_cycle.is_none());
        assert!(plan_change::due_plan_change(&sub, at(31, 2)).is_none());
    }

    #[test]
    fn cancel_then_reactivate_restores_renewal() {
        let mut sub = subscription(at(1, 0), at(31, 0));
        let end = schedule_cancellation(&mut sub, Some("too expensive".to_string()), at(5, 0)).unwrap();
        assert_eq!(end, at(31, 0));
        assert!(sub.cancel_at_period_end);
        assert!(!sub.auto_renew);
        assert_eq!(sub.end_date, Some(at(31, 0)));
        assert!(schedule_cancellation(&mut sub, None, at(6, 0)).is_err());

        undo_cancellation(&mut sub, true, at(10, 0)).unwrap();
        assert!(!sub.cancel_at_period_end);
        assert!(sub.cancelled_at.is_none());
        assert!(sub.cancellation_reason.is_none());
        assert!(sub.end_date.is_none());
        assert!(sub.auto_renew);
        assert_eq!(sub.next_payment_date, Some(at(31, 0)));
    }

    #[test]
    fn reactivation_needs_a_running_cancellation() {
        let mut sub = subscription(at(1, 0), at(31, 0));
        assert!(undo_cancellation(&mut sub, true, at(2, 0)).is_err());

        schedule_cancellation(&mut sub, None, at(2, 0)).unwrap();
        assert!(undo_cancellation(&mut sub, true, at(31, 0)).is_err());
        assert!(sub.cancel_at_period_end);
    }

    #[test]
    fn cancelling_a_trial_ends_with_the_trial() {
        let mut sub = trialing();
        sub.current_period_end = at(20, 0);
        let end = schedule_cancellation(&mut sub, None, at(3, 0)).unwrap();
        assert_eq!(end, at(15, 0));
    }

    #[test]
    fn proration_credit_reduces_the_charge() {
        let sub = subscription(at(1, 0), at(31, 0));
        let credit = plan_change::proration_credit(&sub, 3_000, at(16, 0));
        assert_eq!(credit, 1_500);
        assert_eq!(charged_amount(5_000, credit), 3_500);
        assert_eq!(charged_amount(1_000, credit), 0);
    }
}
