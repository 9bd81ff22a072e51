//! Password authentication and refresh-token rotation.
//!
//! Refresh tokens are opaque `rt_` strings. Each one belongs to a family
//! started at login; presenting a token that was already rotated revokes
//! the whole family.

use chrono::{DateTime, Duration, Utc};
use common::{
    env_config::JwtConfig,
    error::{AppError, ErrorCode, Res},
    jwt::{self, TokenSubject},
    misc::{hash_str, verify_hash},
    token::RefreshClaims,
};
use db::{
    dtos::user::{RefreshTokenCreateRequest, UserCreateRequest},
    models::user::{AccountStatus, AuthCredentials, RefreshToken, User, UserRole},
};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::dtos::auth::{LoginRequest, RegisterRequest};

const MIN_PASSWORD_LEN: usize = 8;

/// Tokens handed out by login and refresh.
pub struct Session {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_token_id: Uuid,
    pub refresh_expires_at: DateTime<Utc>,
}

fn invalid_credentials() -> AppError {
    AppError::coded(ErrorCode::InvalidCredentials, "Invalid email or password")
}

fn invalid_refresh(message: &str) -> AppError {
    AppError::coded(ErrorCode::InvalidRefreshToken, message)
}

fn validate_registration(req: &RegisterRequest) -> Res<()> {
    let email = req.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::coded(ErrorCode::ValidationError, "A valid email is required"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::coded(
            ErrorCode::ValidationError,
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    if req.full_name.trim().is_empty() {
        return Err(AppError::coded(ErrorCode::ValidationError, "Full name is required"));
    }
    Ok(())
}

/// Creates an account with credentials. An account that gym staff created
/// for a member (`pending_setup`) is claimed instead of duplicated.
pub async fn register(conn: &mut PgConnection, req: RegisterRequest) -> Res<User> {
    validate_registration(&req)?;
    let email = req.email.trim().to_lowercase();

    if let Some(username) = req.username.as_deref() {
        if db::user::exists_user_by_username(&mut *conn, username).await? {
            return Err(AppError::coded(ErrorCode::UserAlreadyExists, "Username is already taken"));
        }
    }

    let user = match db::user::find_user_by_email(&mut *conn, &email).await? {
        Some(existing) if existing.account_status == AccountStatus::PendingSetup => {
            log::info!("Claiming pending account {}", existing.id);
            db::user::activate_user(
                &mut *conn,
                existing.id,
                req.full_name.trim(),
                req.username.as_deref(),
            )
            .await?
        }
        Some(_) => {
            return Err(AppError::coded(
                ErrorCode::UserAlreadyExists,
                "An account with this email already exists",
            ));
        }
        None => {
            db::user::insert_user(
                &mut *conn,
                UserCreateRequest {
                    email,
                    username: req.username,
                    full_name: req.full_name.trim().to_string(),
                    phone: req.phone,
                    role: UserRole::Member,
                    account_status: AccountStatus::Active,
                },
            )
            .await?
        }
    };

    db::user::insert_user_with_credentials(
        &mut *conn,
        AuthCredentials {
            user_id: user.id,
            password_hash: hash_str(&req.password)?,
        },
    )
    .await?;

    Ok(user)
}

pub async fn authenticate(conn: &mut PgConnection, req: &LoginRequest) -> Res<User> {
    let credentials = db::user::get_credentials_by_email(&mut *conn, req.email.trim())
        .await?
        .ok_or_else(invalid_credentials)?;

    if !verify_hash(&req.password, &credentials.password_hash) {
        log::debug!("Password mismatch for user {}", credentials.user_id);
        return Err(invalid_credentials());
    }
    db::user::get_user_by_id(&mut *conn, credentials.user_id).await
}

/// Issues an access token and a refresh token. `family_id` is `None` at
/// login and carried over on rotation.
pub async fn issue_session(
    conn: &mut PgConnection,
    user: User,
    family_id: Option<Uuid>,
    config: &JwtConfig,
    now: DateTime<Utc>,
) -> Res<Session> {
    let access_token = jwt::generate_jwt(
        TokenSubject {
            user_id: user.id,
            email: user.email.clone(),
        },
        config,
    )?;

    let claims = RefreshClaims::new(user.id, family_id.unwrap_or_else(Uuid::new_v4));
    let refresh_expires_at = now + Duration::days(config.refresh_expiration_days);
    db::user::insert_refresh_token(
        &mut *conn,
        RefreshTokenCreateRequest {
            id: claims.token_id,
            user_id: user.id,
            family_id: claims.family_id,
            token_hash: hash_str(&claims.secret)?,
            expires_at: refresh_expires_at,
        },
    )
    .await?;

    Ok(Session {
        user,
        access_token,
        refresh_token: claims.to_token()?,
        refresh_token_id: claims.token_id,
        refresh_expires_at,
    })
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Rejection {
    Reused,
    Expired,
    Mismatch,
}

/// Checks a presented refresh token against its stored row. `secret_matches`
/// is the hash comparison of the presented secret. A token failing it is a
/// mismatch and never counts as reuse.
pub(crate) fn check_presented(
    stored: &RefreshToken,
    claims: &RefreshClaims,
    secret_matches: bool,
    now: DateTime<Utc>,
) -> Result<(), Rejection> {
    if !secret_matches || stored.user_id != claims.user_id || stored.family_id != claims.family_id {
        return Err(Rejection::Mismatch);
    }
    if stored.revoked_at.is_some() {
        return Err(Rejection::Reused);
    }
    if stored.expires_at <= now {
        return Err(Rejection::Expired);
    }
    Ok(())
}

async fn revoke_family(conn: &mut PgConnection, family_id: Uuid, now: DateTime<Utc>) -> Res<()> {
    let revoked = db::user::revoke_refresh_family(&mut *conn, family_id, now).await?;
    log::warn!("Refresh token reuse detected, revoked {} token(s) in family {}", revoked, family_id);
    Ok(())
}

/// Rotates a refresh token: the presented one is revoked and replaced by a
/// new token in the same family.
pub async fn refresh(
    conn: &mut PgConnection,
    token: &str,
    config: &JwtConfig,
    now: DateTime<Utc>,
) -> Res<Session> {
    let claims = RefreshClaims::from_token(token)?;
    let stored = db::user::find_refresh_token(&mut *conn, claims.token_id)
        .await?
        .ok_or_else(|| invalid_refresh("Unknown refresh token"))?;

    let secret_matches = verify_hash(&claims.secret, &stored.token_hash);
    match check_presented(&stored, &claims, secret_matches, now) {
        Ok(()) => {}
        Err(Rejection::Reused) => {
            revoke_family(conn, stored.family_id, now).await?;
            return Err(invalid_refresh("Refresh token was already used"));
        }
        Err(Rejection::Expired) => return Err(invalid_refresh("Refresh token expired")),
        Err(Rejection::Mismatch) => return Err(invalid_refresh("Refresh token does not match")),
    }

    let user = db::user::get_user_by_id(&mut *conn, stored.user_id).await?;
    let session = issue_session(conn, user, Some(stored.family_id), config, now).await?;

    // lost a race with a concurrent rotation of the same token
    if !db::user::revoke_refresh_token(&mut *conn, stored.id, Some(session.refresh_token_id), now).await? {
        revoke_family(conn, stored.family_id, now).await?;
        return Err(invalid_refresh("Refresh token was already used"));
    }
    Ok(session)
}

/// Revokes the presented token. Unknown or malformed tokens are ignored.
pub async fn logout(conn: &mut PgConnection, token: &str, now: DateTime<Utc>) -> Res<()> {
    let Ok(claims) = RefreshClaims::from_token(token) else {
        return Ok(());
    };
    if let Some(stored) = db::user::find_refresh_token(&mut *conn, claims.token_id).await? {
        if stored.user_id == claims.user_id {
            db::user::revoke_refresh_token(&mut *conn, stored.id, None, now).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored_for(claims: &RefreshClaims, now: DateTime<Utc>) -> RefreshToken {
        RefreshToken {
            id: claims.token_id,
            user_id: claims.user_id,
            family_id: claims.family_id,
            token_hash: String::new(),
            expires_at: now + Duration::days(30),
            revoked_at: None,
            replaced_by: None,
            created_at: now,
        }
    }

    #[test]
    fn fresh_token_is_accepted() {
        let now = Utc::now();
        let claims = RefreshClaims::new(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(check_presented(&stored_for(&claims, now), &claims, true, now), Ok(()));
    }

    #[test]
    fn revoked_token_counts_as_reuse() {
        let now = Utc::now();
        let claims = RefreshClaims::new(Uuid::new_v4(), Uuid::new_v4());
        let mut stored = stored_for(&claims, now);
        stored.revoked_at = Some(now - Duration::minutes(1));
        // reuse wins over expiry so the family still gets revoked
        stored.expires_at = now - Duration::days(1);
        assert_eq!(check_presented(&stored, &claims, true, now), Err(Rejection::Reused));
    }

    #[test]
    fn expired_token_is_rejected() {
        let now = Utc::now();
        let claims = RefreshClaims::new(Uuid::new_v4(), Uuid::new_v4());
        let mut stored = stored_for(&claims, now);
        stored.expires_at = now;
        assert_eq!(check_presented(&stored, &claims, true, now), Err(Rejection::Expired));
    }

    #[test]
    fn token_of_other_user_is_a_mismatch() {
        let now = Utc::now();
        let claims = RefreshClaims::new(Uuid::new_v4(), Uuid::new_v4());
        let mut stored = stored_for(&claims, now);
        stored.user_id = Uuid::new_v4();
        assert_eq!(check_presented(&stored, &claims, true, now), Err(Rejection::Mismatch));
    }

    #[test]
    fn wrong_secret_on_used_token_does_not_revoke_the_family() {
        let now = Utc::now();
        let claims = RefreshClaims::new(Uuid::new_v4(), Uuid::new_v4());
        let mut stored = stored_for(&claims, now);
        stored.revoked_at = Some(now - Duration::minutes(1));
        assert_eq!(check_presented(&stored, &claims, false, now), Err(Rejection::Mismatch));
        assert_eq!(check_presented(&stored, &claims, true, now), Err(Rejection::Reused));
    }

    #[test]
    fn registration_rejects_short_password_and_bad_email() {
        let req = |email: &str, password: &str| RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            full_name: "Amina B".to_string(),
            username: None,
            phone: None,
        };
        assert!(validate_registration(&req("amina@gym.test", "longenough")).is_ok());
        assert_eq!(
            validate_registration(&req("amina@gym.test", "short")).unwrap_err().code(),
            ErrorCode::ValidationError
        );
        assert_eq!(
            validate_registration(&req("amina", "longenough")).unwrap_err().code(),
            ErrorCode::ValidationError
        );
    }
}
