use actix_web::{HttpRequest, Responder, post, web};
use chrono::Utc;
use common::{
    env_config::Config,
    error::{AppError, Res},
    http::Success,
};
use sqlx::PgPool;
use std::sync::Arc;

use crate::services;

/// Handles Stripe webhook events for app subscriptions.
///
/// # Input
/// - `payload`: Raw string containing the webhook event data
/// - `req`: HTTP request containing Stripe signature in headers
/// - `config`: Application configuration with webhook secret
///
/// # Output
/// - Success: Returns 200 OK when webhook is processed successfully
/// - Error: Returns 400 Bad Request for invalid signature or 500 for processing errors
///
/// # Note
/// This endpoint is not called from the frontend. Stripe calls it when
/// subscription or invoice state changes. Configure
/// `https://yourapp.com/api/billing/webhook` in the Stripe Dashboard and set
/// the signing secret as `STRIPE_WEBHOOK_SECRET`.
///
/// # Event Types Handled
/// - customer.subscription.created / updated: period boundaries and status
/// - customer.subscription.deleted: subscription cancelled
/// - invoice.payment_succeeded: renewal, clears the grace window
/// - invoice.payment_failed: opens the soft grace window
#[post("")]
pub async fn post_webhook(
    payload: String,
    req: HttpRequest,
    config: web::Data<Arc<Config>>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let signature = match req.headers().get("stripe-signature") {
        Some(signature) => signature.to_str().unwrap_or(""),
        None => return Err(AppError::BadRequest("Stripe signature missing".to_string())),
    };

    let event = services::webhook::construct_event(&payload, signature, &config.stripe_webhook_secret)?;

    let mut tx = pool.begin().await?;
    services::webhook::process_event(&mut tx, event, Utc::now()).await?;
    tx.commit().await?;

    Success::message("Webhook processed successfully")
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test};
    use common::env_config::JwtConfig;

    fn config() -> Arc<Config> {
        Arc::new(Config {
            environment: "development".to_string(),
            database_url: "postgres://localhost/gymflow_test".to_string(),
            jwt_config: JwtConfig {
                secret: "secret".to_string(),
                expiration_minutes: 15,
                refresh_expiration_days: 30,
            },
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            num_workers: 1,
            cors_allowed_origin: "http://localhost:3000".to_string(),
            console_logging_enabled: false,
            stripe_secret_key: String::new(),
            stripe_webhook_secret: "whsec_test".to_string(),
            rate_limit_per_second: 20,
            region_cache_ttl_hours: 24,
        })
    }

    #[actix_web::test]
    async fn rejects_unsigned_and_forged_events() {
        let pool = Arc::new(PgPool::connect_lazy("postgres://localhost/gymflow_test").unwrap());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(config()))
                .app_data(web::Data::new(pool))
                .service(crate::mount_webhook()),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/billing/webhook")
            .set_payload("{}")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["errorCode"], "INVALID_REQUEST");

        let req = test::TestRequest::post()
            .uri("/billing/webhook")
            .insert_header(("stripe-signature", "t=1,v1=deadbeef"))
            .set_payload("{}")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
