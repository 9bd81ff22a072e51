use std::sync::Arc;

use actix_web::web;
use common::env_config::Config;
use middleware::auth::AuthMiddleware;

pub mod middleware {
    pub mod auth;
}
pub mod routes {
    pub mod auth;
    pub mod notification;
    pub mod user;
}
pub mod services {
    pub mod auth;
    pub mod notification;
    pub mod user;
}
pub mod dtos {
    pub mod auth;
    pub mod user;
}

// Auth middleware
pub fn auth_middleware(config: Arc<Config>) -> AuthMiddleware {
    AuthMiddleware::new(config.jwt_config.secret.clone())
}

/// Public credential routes.
pub fn mount_auth() -> actix_web::Scope {
    web::scope("/auth")
        .service(routes::auth::post_register)
        .service(routes::auth::post_login)
        .service(routes::auth::post_refresh)
        .service(routes::auth::post_logout)
}

/// Profile, onboarding and the notification inbox. Wrap with the auth
/// middleware.
pub fn mount_user() -> actix_web::Scope {
    web::scope("/user")
        .service(routes::user::get_me)
        .service(routes::user::post_onboarding)
        .service(routes::notification::get_notifications)
        .service(routes::notification::get_unread_count)
        .service(routes::notification::post_read_all)
        .service(routes::notification::post_read)
}
