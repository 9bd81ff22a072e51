use actix_web::{HttpMessage, HttpResponse, dev::ServiceRequest};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    env_config::JwtConfig,
    error::{AppError, Res},
};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtClaims {
    pub user_id: Uuid,
    pub email: String,
    pub exp: usize,
}

pub struct TokenSubject {
    pub user_id: Uuid,
    pub email: String,
}

/// Generates a short lived access token for the given user.
pub fn generate_jwt(subject: TokenSubject, config: &JwtConfig) -> Res<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::minutes(config.expiration_minutes))
        .ok_or_else(|| AppError::Internal("Token expiration overflow".to_string()))?
        .timestamp();

    let claims = JwtClaims {
        user_id: subject.user_id,
        email: subject.email,
        exp: expiration as usize,
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(AppError::from)
}

/// Extracts claims object from JWT token.
/// Requires JWT secret.
///
/// Expired or tampered tokens map to `Unauthorized` so the client can
/// attempt a refresh.
pub fn validate_jwt(token: &str, secret: &str) -> Res<JwtClaims> {
    jsonwebtoken::decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
}

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_owned())
        .filter(|token| !token.is_empty())
}

pub fn get_jwt_claims_or_error(req: &ServiceRequest) -> Result<JwtClaims, HttpResponse> {
    if let Some(jwt_claims_res) = req.extensions().get::<Res<JwtClaims>>() {
        match jwt_claims_res {
            Ok(claims) => Ok(claims.clone()),
            Err(app_error) => Err(app_error.to_http_response()),
        }
    } else {
        Err(
            AppError::Unauthorized("No authorization token provided".to_string())
                .to_http_response(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(minutes: i64) -> JwtConfig {
        JwtConfig {
            secret: "test-secret".to_string(),
            expiration_minutes: minutes,
            refresh_expiration_days: 30,
        }
    }

    #[test]
    fn issued_token_validates_with_same_secret() {
        let user_id = Uuid::new_v4();
        let token = generate_jwt(
            TokenSubject {
                user_id,
                email: "owner@gym.test".to_string(),
            },
            &config(15),
        )
        .unwrap();

        let claims = validate_jwt(&token, "test-secret").unwrap();
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.email, "owner@gym.test");
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let token = generate_jwt(
            TokenSubject {
                user_id: Uuid::new_v4(),
                email: "a@b.c".to_string(),
            },
            &config(15),
        )
        .unwrap();

        let err = validate_jwt(&token, "other").unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn expired_token_is_unauthorized() {
        // well past the default 60s leeway
        let token = generate_jwt(
            TokenSubject {
                user_id: Uuid::new_v4(),
                email: "a@b.c".to_string(),
            },
            &config(-10),
        )
        .unwrap();

        assert!(matches!(
            validate_jwt(&token, "test-secret"),
            Err(AppError::Unauthorized(_))
        ));
    }
}
