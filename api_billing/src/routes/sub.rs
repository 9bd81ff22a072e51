use actix_web::{Responder, delete, get, post, web};
use chrono::Utc;
use common::{error::Res, http::Success, jwt::JwtClaims};
use sqlx::PgPool;
use std::sync::Arc;

use crate::{
    dtos::sub::{BlockerResponse, CancelRequest, DowngradeRequest, SubscribeRequest, TrialRequest},
    services::subscription,
};

/// Returns the caller's live subscription with its plan and effective status.
///
/// Applies a due scheduled plan change and opens the soft grace window on
/// the first read after a lapse.
///
/// # Output
/// - Success: `{ subscription, plan, resolution: { status, reason, expiryDate, grace } }`
///   or `null` data when the user has no live subscription
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/billing/sub/me', {
///   headers: { 'Authorization': `Bearer ${accessToken}` }
/// });
/// const { data } = await response.json();
/// if (data && data.resolution.status === 'read_only') {
///   disableEditing();
/// }
/// ```
#[get("/me")]
pub async fn get_me(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let mut tx = pool.begin().await?;
    let view = subscription::get_my_subscription(&mut tx, claims.user_id, Utc::now()).await?;
    tx.commit().await?;
    Success::ok(view)
}

/// Subscribes the caller to a plan, or upgrades the current one.
///
/// # Input
/// - `planId`: target plan slug
/// - `billingCycle`: `monthly`, `yearly` or `one_time`
/// - `currency`: optional ISO code, defaults to `DZD`
/// - `paymentMethod`: optional free-form label
///
/// # Output
/// - Success: 201 with `{ subscription, amountPaid, prorationCredit, currency }`
/// - Error: 409 `ALREADY_SUBSCRIBED`, 400 `INVALID_PLAN_CHANGE` for downgrades
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/billing/sub/subscribe', {
///   method: 'POST',
///   headers: {
///     'Content-Type': 'application/json',
///     'Authorization': `Bearer ${accessToken}`
///   },
///   body: JSON.stringify({ planId: 'pro', billingCycle: 'monthly', currency: 'DZD' })
/// });
/// ```
#[post("/subscribe")]
pub async fn post_subscribe(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    req: web::Json<SubscribeRequest>,
) -> Res<impl Responder> {
    let mut tx = pool.begin().await?;
    let outcome = subscription::subscribe(&mut tx, claims.user_id, req.into_inner(), Utc::now()).await?;
    tx.commit().await?;
    Success::created(outcome)
}

/// Starts the caller's one free trial.
///
/// # Input
/// - `planId`: plan to trial
///
/// # Output
/// - Success: 201 with the trialing subscription
/// - Error: 400 `TRIAL_ALREADY_USED`
#[post("/trial")]
pub async fn post_trial(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    req: web::Json<TrialRequest>,
) -> Res<impl Responder> {
    let mut tx = pool.begin().await?;
    let sub = subscription::start_trial(&mut tx, claims.user_id, &req.plan_id, Utc::now()).await?;
    tx.commit().await?;
    Success::created(sub)
}

/// Schedules a downgrade or billing cycle switch-down for the end of the
/// current period.
///
/// # Input
/// - `planId`, `billingCycle`: the target
///
/// # Output
/// - Success: subscription with `pendingPlanId` and `pendingChangeEffectiveDate` set
/// - Error: 409 `PENDING_CHANGE_EXISTS`, 400 `INVALID_PLAN_CHANGE` for upgrades
#[post("/downgrade")]
pub async fn post_downgrade(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    req: web::Json<DowngradeRequest>,
) -> Res<impl Responder> {
    let mut tx = pool.begin().await?;
    let sub = subscription::downgrade(&mut tx, claims.user_id, req.into_inner(), Utc::now()).await?;
    tx.commit().await?;
    Success::ok(sub)
}

/// Cancels the subscription at the end of the current period.
///
/// # Input
/// - `reason`: optional
///
/// # Output
/// - Success: subscription with `cancelAtPeriodEnd: true`
/// - Error: 429 `SUBSCRIPTION_CANCEL_LIMIT_EXCEEDED` after three cancellations in a day
#[post("/cancel")]
pub async fn post_cancel(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    req: Option<web::Json<CancelRequest>>,
) -> Res<impl Responder> {
    let reason = req.and_then(|r| r.into_inner().reason);
    let mut tx = pool.begin().await?;
    let sub = subscription::cancel(&mut tx, claims.user_id, reason, Utc::now()).await?;
    tx.commit().await?;
    Success::ok(sub)
}

/// Undoes a scheduled cancellation.
#[post("/reactivate")]
pub async fn post_reactivate(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let mut tx = pool.begin().await?;
    let sub = subscription::reactivate(&mut tx, claims.user_id, Utc::now()).await?;
    tx.commit().await?;
    Success::ok(sub)
}

/// Drops a scheduled plan change.
///
/// # Output
/// - Error: 400 `NO_PENDING_CHANGE` when nothing is scheduled
#[delete("/pending")]
pub async fn delete_pending(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let mut tx = pool.begin().await?;
    let sub = subscription::cancel_pending_change(&mut tx, claims.user_id, Utc::now()).await?;
    tx.commit().await?;
    Success::ok(sub)
}

#[get("/history")]
pub async fn get_history(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let mut conn = pool.acquire().await?;
    let history = subscription::history(&mut conn, claims.user_id).await?;
    Success::ok(history)
}

/// Returns the warning or blocker modal the dashboard should show.
///
/// # Output
/// - Success: `{ blocker: null }` when nothing needs attention, otherwise
///   `{ blocker: { type, reason, severity, timing, canDismiss, titleKey, messageKey, ... } }`
///
/// # Frontend Example
/// ```javascript
/// const { data } = await (await fetch('/api/billing/sub/blocker', {
///   headers: { 'Authorization': `Bearer ${accessToken}` }
/// })).json();
/// if (data.blocker) {
///   openModal(t(data.blocker.titleKey), t(data.blocker.messageKey), data.blocker.canDismiss);
/// }
/// ```
#[get("/blocker")]
pub async fn get_blocker(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let mut tx = pool.begin().await?;
    let blocker = subscription::blocker(&mut tx, claims.user_id, Utc::now()).await?;
    tx.commit().await?;
    Success::ok(BlockerResponse { blocker })
}
