use actix_web::{HttpResponse, http::StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Res<T> = std::result::Result<T, AppError>;

/// Machine readable error codes carried in the `errorCode` field of every
/// failed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidRequest,
    ValidationError,
    Unauthorized,
    InvalidCredentials,
    InvalidRefreshToken,
    InsufficientPermissions,
    NotFound,
    UserNotFound,
    GymNotFound,
    MemberNotFound,
    PlanNotFound,
    InvoiceNotFound,
    Conflict,
    UserAlreadyExists,
    MemberAlreadyExists,
    StaffAlreadyExists,
    AlreadySubscribed,
    InvalidPlanChange,
    NoActiveSubscription,
    PendingChangeExists,
    NoPendingChange,
    TrialAlreadyUsed,
    SubscriptionCancelLimitExceeded,
    MembershipInactive,
    ClassFull,
    ProgramNotFound,
    NoActiveProgram,
    ProgramPauseLimitExceeded,
    CoachNotFound,
    CoachRequestNotFound,
    CoachRequestAlreadyExists,
    AffiliationNotFound,
    AffiliationAlreadyExists,
    AffiliationInvalidAction,
    TooManyRequests,
    InternalError,
    UnknownError,
}

impl ErrorCode {
    const ALL: [ErrorCode; 37] = [
        ErrorCode::InvalidRequest,
        ErrorCode::ValidationError,
        ErrorCode::Unauthorized,
        ErrorCode::InvalidCredentials,
        ErrorCode::InvalidRefreshToken,
        ErrorCode::InsufficientPermissions,
        ErrorCode::NotFound,
        ErrorCode::UserNotFound,
        ErrorCode::GymNotFound,
        ErrorCode::MemberNotFound,
        ErrorCode::PlanNotFound,
        ErrorCode::InvoiceNotFound,
        ErrorCode::Conflict,
        ErrorCode::UserAlreadyExists,
        ErrorCode::MemberAlreadyExists,
        ErrorCode::StaffAlreadyExists,
        ErrorCode::AlreadySubscribed,
        ErrorCode::InvalidPlanChange,
        ErrorCode::NoActiveSubscription,
        ErrorCode::PendingChangeExists,
        ErrorCode::NoPendingChange,
        ErrorCode::TrialAlreadyUsed,
        ErrorCode::SubscriptionCancelLimitExceeded,
        ErrorCode::MembershipInactive,
        ErrorCode::ClassFull,
        ErrorCode::ProgramNotFound,
        ErrorCode::NoActiveProgram,
        ErrorCode::ProgramPauseLimitExceeded,
        ErrorCode::CoachNotFound,
        ErrorCode::CoachRequestNotFound,
        ErrorCode::CoachRequestAlreadyExists,
        ErrorCode::AffiliationNotFound,
        ErrorCode::AffiliationAlreadyExists,
        ErrorCode::AffiliationInvalidAction,
        ErrorCode::TooManyRequests,
        ErrorCode::InternalError,
        ErrorCode::UnknownError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorCode::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            ErrorCode::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::UserNotFound => "USER_NOT_FOUND",
            ErrorCode::GymNotFound => "GYM_NOT_FOUND",
            ErrorCode::MemberNotFound => "MEMBER_NOT_FOUND",
            ErrorCode::PlanNotFound => "PLAN_NOT_FOUND",
            ErrorCode::InvoiceNotFound => "INVOICE_NOT_FOUND",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::UserAlreadyExists => "USER_ALREADY_EXISTS",
            ErrorCode::MemberAlreadyExists => "MEMBER_ALREADY_EXISTS",
            ErrorCode::StaffAlreadyExists => "STAFF_ALREADY_EXISTS",
            ErrorCode::AlreadySubscribed => "ALREADY_SUBSCRIBED",
            ErrorCode::InvalidPlanChange => "INVALID_PLAN_CHANGE",
            ErrorCode::NoActiveSubscription => "NO_ACTIVE_SUBSCRIPTION",
            ErrorCode::PendingChangeExists => "PENDING_CHANGE_EXISTS",
            ErrorCode::NoPendingChange => "NO_PENDING_CHANGE",
            ErrorCode::TrialAlreadyUsed => "TRIAL_ALREADY_USED",
            ErrorCode::SubscriptionCancelLimitExceeded => "SUBSCRIPTION_CANCEL_LIMIT_EXCEEDED",
            ErrorCode::MembershipInactive => "MEMBERSHIP_INACTIVE",
            ErrorCode::ClassFull => "CLASS_FULL",
            ErrorCode::ProgramNotFound => "PROGRAM_NOT_FOUND",
            ErrorCode::NoActiveProgram => "NO_ACTIVE_PROGRAM",
            ErrorCode::ProgramPauseLimitExceeded => "PROGRAM_PAUSE_LIMIT_EXCEEDED",
            ErrorCode::CoachNotFound => "COACH_NOT_FOUND",
            ErrorCode::CoachRequestNotFound => "COACH_REQUEST_NOT_FOUND",
            ErrorCode::CoachRequestAlreadyExists => "COACH_REQUEST_ALREADY_EXISTS",
            ErrorCode::AffiliationNotFound => "AFFILIATION_NOT_FOUND",
            ErrorCode::AffiliationAlreadyExists => "AFFILIATION_ALREADY_EXISTS",
            ErrorCode::AffiliationInvalidAction => "AFFILIATION_INVALID_ACTION",
            ErrorCode::TooManyRequests => "TOO_MANY_REQUESTS",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Parses a wire code. Unknown codes yield `None`.
    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == code)
    }

    /// Fallback code for a response that carries only an HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => ErrorCode::InvalidRequest,
            401 => ErrorCode::Unauthorized,
            403 => ErrorCode::InsufficientPermissions,
            404 => ErrorCode::NotFound,
            409 => ErrorCode::Conflict,
            422 => ErrorCode::ValidationError,
            429 => ErrorCode::TooManyRequests,
            500 => ErrorCode::InternalError,
            _ => ErrorCode::UnknownError,
        }
    }

    /// HTTP status used when an error is raised with an explicit code.
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidRequest
            | ErrorCode::InvalidPlanChange
            | ErrorCode::NoPendingChange
            | ErrorCode::TrialAlreadyUsed
            | ErrorCode::AffiliationInvalidAction => StatusCode::BAD_REQUEST,
            ErrorCode::ValidationError => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::Unauthorized
            | ErrorCode::InvalidCredentials
            | ErrorCode::InvalidRefreshToken => StatusCode::UNAUTHORIZED,
            ErrorCode::InsufficientPermissions | ErrorCode::MembershipInactive => {
                StatusCode::FORBIDDEN
            }
            ErrorCode::NotFound
            | ErrorCode::UserNotFound
            | ErrorCode::GymNotFound
            | ErrorCode::MemberNotFound
            | ErrorCode::PlanNotFound
            | ErrorCode::InvoiceNotFound
            | ErrorCode::ProgramNotFound
            | ErrorCode::NoActiveProgram
            | ErrorCode::CoachNotFound
            | ErrorCode::CoachRequestNotFound
            | ErrorCode::AffiliationNotFound
            | ErrorCode::NoActiveSubscription => StatusCode::NOT_FOUND,
            ErrorCode::Conflict
            | ErrorCode::UserAlreadyExists
            | ErrorCode::MemberAlreadyExists
            | ErrorCode::StaffAlreadyExists
            | ErrorCode::AlreadySubscribed
            | ErrorCode::PendingChangeExists
            | ErrorCode::CoachRequestAlreadyExists
            | ErrorCode::AffiliationAlreadyExists
            | ErrorCode::ClassFull => StatusCode::CONFLICT,
            ErrorCode::TooManyRequests
            | ErrorCode::SubscriptionCancelLimitExceeded
            | ErrorCode::ProgramPauseLimitExceeded => {
                StatusCode::TOO_MANY_REQUESTS
            }
            ErrorCode::InternalError | ErrorCode::UnknownError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ErrorCode::parse(&raw).unwrap_or(ErrorCode::UnknownError))
    }
}

/// Uniform response envelope: `{ success, data?, message?, errorCode? }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error_code: None,
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            error_code: Some(code),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    // === CONVERSION ERRORS ===
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JWT error: {0}")]
    JWT(#[from] jsonwebtoken::errors::Error),

    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Stripe error: {0}")]
    Stripe(#[from] stripe::StripeError),

    // === APPLICATION ERRORS ===
    #[error("Authorization error: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Resource conflict: {0}")]
    Conflict(String),

    #[error("Too Many Requests: {0}")]
    TooManyRequests(String),

    /// Error with an explicit code; the HTTP status follows the code.
    #[error("{1}")]
    Coded(ErrorCode, String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn coded(code: ErrorCode, message: impl Into<String>) -> Self {
        AppError::Coded(code, message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            AppError::Database(_)
            | AppError::JWT(_)
            | AppError::Reqwest(_)
            | AppError::Stripe(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Coded(code, _) => code.status(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Coded(code, _) => *code,
            _ => ErrorCode::from_status(self.status().as_u16()),
        }
    }

    pub fn to_http_response(&self) -> HttpResponse {
        let is_dev = cfg!(debug_assertions);
        let status = self.status();

        let internal_message = |err_msg: String| {
            if is_dev {
                err_msg
            } else {
                "Internal server error".to_string()
            }
        };

        let message = match self {
            // === CONVERSION ERRORS ===
            AppError::Database(sqlx::Error::RowNotFound) => "Resource not found".to_string(),
            AppError::Database(error) => {
                log::error!("Database error: {}", error);
                internal_message(error.to_string())
            }
            AppError::JWT(error) => {
                log::error!("JWT error: {}", error);
                internal_message(error.to_string())
            }
            AppError::Reqwest(error) => {
                log::error!("Reqwest error: {}", error);
                internal_message(error.to_string())
            }
            AppError::Stripe(error) => {
                log::error!("Stripe error: {}", error);
                internal_message(error.to_string())
            }
            AppError::Internal(error) => {
                log::error!("Internal error: {}", error);
                internal_message(error.clone())
            }

            // === APPLICATION ERRORS ===
            _ => self.to_string(),
        };

        HttpResponse::build(status).json(ApiResponse::<()>::error(self.code(), message))
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    fn error_response(&self) -> HttpResponse {
        self.to_http_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_table_maps_known_codes() {
        assert_eq!(ErrorCode::from_status(400), ErrorCode::InvalidRequest);
        assert_eq!(ErrorCode::from_status(401), ErrorCode::Unauthorized);
        assert_eq!(ErrorCode::from_status(403), ErrorCode::InsufficientPermissions);
        assert_eq!(ErrorCode::from_status(404), ErrorCode::NotFound);
        assert_eq!(ErrorCode::from_status(429), ErrorCode::TooManyRequests);
        assert_eq!(ErrorCode::from_status(418), ErrorCode::UnknownError);
    }

    #[test]
    fn wire_codes_parse_back() {
        for code in ErrorCode::ALL {
            assert_eq!(ErrorCode::parse(code.as_str()), Some(code));
        }
        assert_eq!(ErrorCode::parse("NOPE"), None);
    }

    #[test]
    fn unknown_wire_code_deserializes_as_unknown() {
        let code: ErrorCode = serde_json::from_str("\"SOMETHING_NEW\"").unwrap();
        assert_eq!(code, ErrorCode::UnknownError);
    }

    #[test]
    fn plain_errors_derive_code_from_status() {
        let err = AppError::Forbidden("nope".to_string());
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.code(), ErrorCode::InsufficientPermissions);

        let err = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn coded_errors_keep_their_code() {
        let err = AppError::coded(ErrorCode::SubscriptionCancelLimitExceeded, "limit");
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.code(), ErrorCode::SubscriptionCancelLimitExceeded);
    }

    #[test]
    fn envelope_serializes_camel_case() {
        let body = ApiResponse::<()>::error(ErrorCode::PlanNotFound, "missing");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["errorCode"], "PLAN_NOT_FOUND");
        assert_eq!(json["message"], "missing");
        assert!(json.get("data").is_none());
    }
}
