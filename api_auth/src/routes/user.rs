use std::sync::Arc;

use actix_web::{Responder, get, post, web};
use chrono::Utc;
use common::{error::Res, http::Success, jwt::JwtClaims};
use sqlx::PgPool;

use crate::{dtos::user::OnboardingRequest, services};

/// Endpoint to retrieve the current authenticated user's information.
///
/// # Output
/// - Success: the user profile
/// - Error: 401 without a valid access token, 404 `USER_NOT_FOUND`
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/user/me', {
///   headers: {
///     'Authorization': `Bearer ${accessToken}`
///   }
/// });
///
/// const { data: user } = await response.json();
/// // { id, email, fullName, role, isOnboarded, accountStatus, ... }
/// ```
#[get("/me")]
pub async fn get_me(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let mut conn = pool.acquire().await?;
    let user = services::user::get_user_by_id(&mut conn, claims.user_id).await?;
    Success::ok(user)
}

/// Completes first-run setup in one transaction.
///
/// # Input
/// - `role`: `owner`, `coach` or `member`
/// - `gym`: required for owners, same body as `POST /api/gyms`
///
/// # Output
/// - Success: `{ user, gym, subscription }`; `subscription` is the free plan
///   when the user had none
/// - Error: 409 when already onboarded
///
/// # Frontend Example
/// ```javascript
/// await fetch('/api/user/onboarding', {
///   method: 'POST',
///   headers: {
///     'Content-Type': 'application/json',
///     'Authorization': `Bearer ${accessToken}`
///   },
///   body: JSON.stringify({
///     role: 'owner',
///     gym: { name: 'Iron Temple', city: 'Oran' }
///   })
/// });
/// ```
#[post("/onboarding")]
pub async fn post_onboarding(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    req: web::Json<OnboardingRequest>,
) -> Res<impl Responder> {
    let mut tx = pool.begin().await?;
    let onboarded =
        services::user::onboard(&mut tx, claims.user_id, req.into_inner(), Utc::now()).await?;
    tx.commit().await?;
    Success::ok(onboarded)
}
