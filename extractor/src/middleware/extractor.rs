use std::{future::Future, pin::Pin, sync::Arc};

use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    web,
};
use futures::future::{Ready, ok};

use common::{
    env_config::Config,
    error::Res,
    jwt::{self, JwtClaims},
};

/// Parses the bearer token of every request and stores the outcome as
/// `Res<JwtClaims>` in the request extensions. Nothing is rejected here;
/// the auth middleware decides.
pub struct ExtractionMiddleware {}

impl ExtractionMiddleware {
    pub fn new() -> Self {
        Self {}
    }
}

impl<S, B> Transform<S, ServiceRequest> for ExtractionMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Transform = ExtractionMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ExtractionMiddlewareService {
            service: Arc::new(service),
        })
    }
}

pub struct ExtractionMiddlewareService<S> {
    service: Arc<S>,
}

impl<S, B> Service<ServiceRequest> for ExtractionMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = jwt::bearer_token(&req);
        let secret = req
            .app_data::<web::Data<Arc<Config>>>()
            .map(|config| config.jwt_config.secret.clone());
        let srv = Arc::clone(&self.service);

        Box::pin(async move {
            match (token, secret) {
                (Some(token), Some(secret)) => {
                    // validate token and insert claims to request object for future use
                    let claims_res = jwt::validate_jwt(&token, &secret);
                    req.extensions_mut().insert::<Res<JwtClaims>>(claims_res);
                }
                (Some(_), None) => log::error!("Config is not registered as app data"),
                _ => {}
            }
            srv.call(req).await.map(|res| res.map_into_boxed_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpRequest, HttpResponse, test};
    use common::{
        env_config::JwtConfig,
        jwt::{TokenSubject, generate_jwt},
    };
    use uuid::Uuid;

    fn config() -> Arc<Config> {
        Arc::new(Config {
            environment: "development".to_string(),
            database_url: String::new(),
            jwt_config: JwtConfig {
                secret: "extractor-secret".to_string(),
                expiration_minutes: 15,
                refresh_expiration_days: 30,
            },
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            num_workers: 1,
            cors_allowed_origin: String::new(),
            console_logging_enabled: false,
            stripe_secret_key: String::new(),
            stripe_webhook_secret: String::new(),
            rate_limit_per_second: 20,
            region_cache_ttl_hours: 24,
        })
    }

    async fn describe(req: HttpRequest) -> HttpResponse {
        let body = match req.extensions().get::<Res<JwtClaims>>() {
            Some(Ok(claims)) => claims.user_id.to_string(),
            Some(Err(_)) => "invalid".to_string(),
            None => "anonymous".to_string(),
        };
        HttpResponse::Ok().body(body)
    }

    #[actix_web::test]
    async fn stores_claims_or_error_without_rejecting() {
        let config = config();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(config.clone()))
                .wrap(ExtractionMiddleware::new())
                .route("/", web::get().to(describe)),
        )
        .await;

        let user_id = Uuid::new_v4();
        let token = generate_jwt(
            TokenSubject {
                user_id,
                email: "member@gym.test".to_string(),
            },
            &config.jwt_config,
        )
        .unwrap();

        let cases = [
            (Some(format!("Bearer {}", token)), user_id.to_string()),
            (Some("Bearer garbage".to_string()), "invalid".to_string()),
            (None, "anonymous".to_string()),
        ];
        for (header, expected) in cases {
            let mut req = test::TestRequest::get().uri("/");
            if let Some(header) = header {
                req = req.insert_header(("Authorization", header));
            }
            let res = test::call_service(&app, req.to_request()).await;
            assert!(res.status().is_success());
            assert_eq!(test::read_body(res).await, expected.as_bytes());
        }
    }
}
