use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::user::{AccountStatus, UserRole};

pub struct UserCreateRequest {
    pub email: String,
    pub username: Option<String>,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    /// `pending_setup` for accounts created by gym staff on a member's behalf.
    pub account_status: AccountStatus,
}

pub struct RefreshTokenCreateRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub family_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

pub struct NotificationCreateRequest {
    pub user_id: Uuid,
    pub key: String,
    pub vars: sqlx::types::JsonValue,
}
