use std::{future::Future, pin::Pin, rc::Rc, sync::Arc};

use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use common::{
    error::{AppError, Res},
    jwt::{self, JwtClaims},
};
use futures::future::{Ready, ok};

/// Rejects requests without a valid access token and exposes the claims to
/// handlers as `web::ReqData<JwtClaims>`.
///
/// Claims already parsed by the extraction middleware are reused; otherwise
/// the bearer header is validated here.
pub struct AuthMiddleware {
    secret: Rc<String>,
}

impl AuthMiddleware {
    pub fn new(secret: String) -> Self {
        AuthMiddleware {
            secret: Rc::new(secret),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddlewareService {
            service: Arc::new(service),
            secret: self.secret.clone(),
        })
    }
}

pub struct AuthMiddlewareService<S> {
    service: Arc<S>,
    secret: Rc<String>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let claims = if req.extensions().contains::<Res<JwtClaims>>() {
            jwt::get_jwt_claims_or_error(&req)
        } else {
            jwt::bearer_token(&req)
                .ok_or_else(|| AppError::Unauthorized("No authorization token provided".to_string()))
                .and_then(|token| jwt::validate_jwt(&token, &self.secret))
                .map_err(|e| e.to_http_response())
        };

        let srv = Arc::clone(&self.service);

        Box::pin(async move {
            match claims {
                Ok(claims) => {
                    req.extensions_mut().insert(claims);
                    srv.call(req).await.map(|res| res.map_into_boxed_body())
                }
                Err(response) => Ok(req.into_response(response)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpResponse, http::StatusCode, test, web};
    use common::{
        env_config::JwtConfig,
        jwt::{TokenSubject, generate_jwt},
    };
    use serde_json::Value;
    use uuid::Uuid;

    const SECRET: &str = "middleware-secret";

    async fn whoami(claims: web::ReqData<JwtClaims>) -> HttpResponse {
        HttpResponse::Ok().body(claims.user_id.to_string())
    }

    fn token(user_id: Uuid, secret: &str) -> String {
        generate_jwt(
            TokenSubject {
                user_id,
                email: "coach@gym.test".to_string(),
            },
            &JwtConfig {
                secret: secret.to_string(),
                expiration_minutes: 15,
                refresh_expiration_days: 30,
            },
        )
        .unwrap()
    }

    #[actix_web::test]
    async fn valid_token_reaches_handler_with_claims() {
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(SECRET.to_string()))
                .route("/me", web::get().to(whoami)),
        )
        .await;

        let user_id = Uuid::new_v4();
        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header(("Authorization", format!("Bearer {}", token(user_id, SECRET))))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = test::read_body(res).await;
        assert_eq!(body, user_id.to_string());
    }

    #[actix_web::test]
    async fn missing_token_is_rejected_with_envelope() {
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(SECRET.to_string()))
                .route("/me", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get().uri("/me").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["errorCode"], "UNAUTHORIZED");
    }

    #[actix_web::test]
    async fn token_signed_with_other_secret_is_rejected() {
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(SECRET.to_string()))
                .route("/me", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header(("Authorization", format!("Bearer {}", token(Uuid::new_v4(), "other"))))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
