use actix_web::{
    HttpRequest, HttpResponse, Responder,
    cookie::{Cookie, SameSite, time},
    post, web,
};
use chrono::Utc;
use common::{
    env_config::Config,
    error::{ApiResponse, AppError, ErrorCode, Res},
    http::Success,
    token::REFRESH_COOKIE,
};
use sqlx::PgPool;
use std::sync::Arc;

use crate::{
    dtos::auth::{AuthResponse, LoginRequest, RegisterRequest},
    services::auth::{self, Session},
};

const REFRESH_COOKIE_PATH: &str = "/api/auth";

fn refresh_cookie(token: String, config: &Config) -> Cookie<'static> {
    Cookie::build(REFRESH_COOKIE, token)
        .path(REFRESH_COOKIE_PATH)
        .http_only(true)
        .secure(config.is_production())
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(config.jwt_config.refresh_expiration_days))
        .finish()
}

fn session_response(session: Session, config: &Config) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(refresh_cookie(session.refresh_token, config))
        .json(ApiResponse::ok(AuthResponse {
            access_token: session.access_token,
            user: session.user,
        }))
}

/// Registers a new user with email and password authentication.
///
/// # Input
/// - `email`, `password` (8+ characters), `fullName`
/// - `username`, `phone`: optional
///
/// # Output
/// - Success: Returns the created user object with 201 Created status
/// - Error: 409 `USER_ALREADY_EXISTS` if the email or username is taken
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/auth/register', {
///   method: 'POST',
///   headers: {
///     'Content-Type': 'application/json'
///   },
///   body: JSON.stringify({
///     email: 'owner@example.com',
///     password: 'securepassword',
///     fullName: 'Yacine Haddad'
///   })
/// });
/// ```
#[post("/register")]
pub async fn post_register(
    req: web::Json<RegisterRequest>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let mut tx = pool.begin().await?;
    let user = auth::register(&mut tx, req.into_inner()).await?;
    tx.commit().await?;
    Success::created(user)
}

/// Authenticates a user with email and password.
///
/// # Output
/// - Success: `{ accessToken, user }` and an `HttpOnly` `refresh_token` cookie
/// - Error: 401 `INVALID_CREDENTIALS`
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/auth/login', {
///   method: 'POST',
///   credentials: 'include',
///   headers: {
///     'Content-Type': 'application/json'
///   },
///   body: JSON.stringify({
///     email: 'owner@example.com',
///     password: 'securepassword'
///   })
/// });
///
/// const { data } = await response.json();
/// sessionStorage.setItem('accessToken', data.accessToken);
/// ```
#[post("/login")]
pub async fn post_login(
    req: web::Json<LoginRequest>,
    config: web::Data<Arc<Config>>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let mut tx = pool.begin().await?;
    let user = auth::authenticate(&mut tx, &req).await?;
    let session = auth::issue_session(&mut tx, user, None, &config.jwt_config, Utc::now()).await?;
    tx.commit().await?;
    Ok(session_response(session, &config))
}

/// Exchanges the `refresh_token` cookie for a new access token.
///
/// The presented refresh token is revoked and a new one is set. Presenting
/// a token that was already used revokes every token of that login.
///
/// # Output
/// - Success: `{ accessToken, user }` and a new `refresh_token` cookie
/// - Error: 401 `INVALID_REFRESH_TOKEN`
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/auth/refresh', {
///   method: 'POST',
///   credentials: 'include'
/// });
/// ```
#[post("/refresh")]
pub async fn post_refresh(
    http_req: HttpRequest,
    config: web::Data<Arc<Config>>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let token = http_req
        .cookie(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| AppError::coded(ErrorCode::InvalidRefreshToken, "No refresh token provided"))?;

    // no transaction: a family revocation must persist even though the call fails
    let mut conn = pool.acquire().await?;
    let session = auth::refresh(&mut conn, &token, &config.jwt_config, Utc::now()).await?;
    Ok(session_response(session, &config))
}

/// Revokes the current refresh token and clears its cookie. Always succeeds.
#[post("/logout")]
pub async fn post_logout(
    http_req: HttpRequest,
    config: web::Data<Arc<Config>>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    if let Some(cookie) = http_req.cookie(REFRESH_COOKIE) {
        let mut conn = pool.acquire().await?;
        auth::logout(&mut conn, cookie.value(), Utc::now()).await?;
    }

    let mut removal = refresh_cookie(String::new(), &config);
    removal.make_removal();
    Ok(HttpResponse::Ok().cookie(removal).json(ApiResponse::<()> {
        success: true,
        data: None,
        message: Some("Logged out".to_string()),
        error_code: None,
    }))
}
