use actix_web::{Responder, get, web};
use common::{error::Res, http::Success};
use sqlx::PgPool;
use std::sync::Arc;

use crate::{dtos::sub::PlansResponse, services};

/// Lists every app plan in display order.
///
/// # Output
/// - Success: `{ plans: AppPlan[] }` inside the response envelope
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/billing/plans', {
///   headers: { 'Authorization': `Bearer ${accessToken}` }
/// });
/// const { data } = await response.json();
/// // data.plans[0] => { planId: "free", level: "free", pricing: { DZD: { monthly: 0 } }, ... }
/// ```
#[get("")]
pub async fn get_plans(pool: web::Data<Arc<PgPool>>) -> Res<impl Responder> {
    let plans = services::plan::list_plans(pool.get_ref().as_ref()).await?;
    Success::ok(PlansResponse { plans })
}

/// Gets a single plan by its slug.
///
/// # Input
/// - `plan_id`: plan slug in the path, e.g. `pro`
///
/// # Output
/// - Success: the `AppPlan`
/// - Error: 404 `PLAN_NOT_FOUND`
#[get("/{plan_id}")]
pub async fn get_plan(
    pool: web::Data<Arc<PgPool>>,
    plan_id: web::Path<String>,
) -> Res<impl Responder> {
    let plan = services::plan::get_plan(pool.get_ref().as_ref(), &plan_id).await?;
    Success::ok(plan)
}
