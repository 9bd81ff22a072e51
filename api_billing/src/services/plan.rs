use common::error::{AppError, ErrorCode, Res};
use db::models::billing::AppPlan;
use sqlx::{Executor, Postgres};

/// Lists the catalogue in display order.
pub async fn list_plans<'e, E: Executor<'e, Database = Postgres>>(executor: E) -> Res<Vec<AppPlan>> {
    db::billing::get_plans(executor).await
}

/// Gets a plan by its stable slug.
pub async fn get_plan<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    plan_id: &str,
) -> Res<AppPlan> {
    db::billing::find_plan(executor, plan_id)
        .await?
        .ok_or_else(|| AppError::coded(ErrorCode::PlanNotFound, format!("Plan '{}' not found", plan_id)))
}
