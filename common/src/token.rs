use base64::{Engine, engine::general_purpose};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, ErrorCode, Res};

pub const REFRESH_COOKIE: &str = "refresh_token";

/// Payload of an opaque refresh token.
///
/// The token row is looked up by `token_id`; `secret` is only ever stored
/// hashed.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RefreshClaims {
    pub token_id: Uuid,
    pub family_id: Uuid,
    pub user_id: Uuid,
    pub secret: String,
}

impl RefreshClaims {
    pub fn new(user_id: Uuid, family_id: Uuid) -> Self {
        Self {
            token_id: Uuid::new_v4(),
            family_id,
            user_id,
            secret: Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn to_token(&self) -> Res<String> {
        let json = serde_json::to_string(self)
            .map_err(|e| AppError::Internal(format!("Failed to encode refresh token: {}", e)))?;
        let encoded = general_purpose::URL_SAFE_NO_PAD.encode(json);
        Ok(format!("rt_{}", encoded))
    }

    pub fn from_token(token: &str) -> Res<Self> {
        let invalid = |msg: String| AppError::coded(ErrorCode::InvalidRefreshToken, msg);

        let encoded = token
            .strip_prefix("rt_")
            .ok_or_else(|| invalid("Missing prefix 'rt_'".to_string()))?;

        let decoded_bytes = general_purpose::URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| invalid(format!("Base64 decode error: {}", e)))?;

        serde_json::from_slice(&decoded_bytes).map_err(|e| invalid(format!("JSON parse error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_decodes_to_same_claims() {
        let claims = RefreshClaims::new(Uuid::new_v4(), Uuid::new_v4());
        let decoded = RefreshClaims::from_token(&claims.to_token().unwrap()).unwrap();
        assert_eq!(decoded.token_id, claims.token_id);
        assert_eq!(decoded.secret, claims.secret);
    }

    #[test]
    fn garbage_is_invalid_refresh_token() {
        for token in ["", "rt_!!!", "sk_abc", "rt_aGVsbG8"] {
            let err = RefreshClaims::from_token(token).unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidRefreshToken);
        }
    }
}
