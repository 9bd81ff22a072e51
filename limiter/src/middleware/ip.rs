use actix_web::{
    Error,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use common::{error::AppError, http::client_ip};
use governor::{Quota, RateLimiter, clock::QuantaClock, state::keyed::DashMapStateStore};
use std::{
    future::Future,
    net::{IpAddr, Ipv4Addr},
    num::NonZeroU32,
    pin::Pin,
    rc::Rc,
    sync::Arc,
};

type IpStateStore = DashMapStateStore<IpAddr>;
type KeyedLimiter = RateLimiter<IpAddr, IpStateStore, QuantaClock>;

/// Limits requests per client IP. Requests without a resolvable address
/// share one bucket.
///
/// The limiter state is created once and shared by every worker.
#[derive(Clone)]
pub struct IpRateLimiter {
    limiter: Arc<KeyedLimiter>,
}

impl IpRateLimiter {
    pub fn new(permits_per_second: u32) -> Self {
        let permits = NonZeroU32::new(permits_per_second).unwrap_or_else(|| {
            log::warn!("Rate limit of 0 requests per second, using 1");
            NonZeroU32::MIN
        });
        Self {
            limiter: Arc::new(RateLimiter::keyed(Quota::per_second(permits))),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for IpRateLimiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Transform = IpRateLimiterService<S>;
    type InitError = ();
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(IpRateLimiterService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
        }))
    }
}

pub struct IpRateLimiterService<S> {
    service: Rc<S>,
    limiter: Arc<KeyedLimiter>,
}

impl<S, B> Service<ServiceRequest> for IpRateLimiterService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = Rc::clone(&self.service);
        let ip = client_ip(&req.connection_info()).unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let allowed = self.limiter.check_key(&ip).is_ok();

        Box::pin(async move {
            if allowed {
                srv.call(req).await.map(|res| res.map_into_boxed_body())
            } else {
                log::debug!("Rate limit reached for {}", ip);
                Ok(req.error_response(AppError::TooManyRequests(
                    "Too many requests. Please slow down.".to_string(),
                )))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpResponse, http::StatusCode, test, web};

    fn from(addr: &str) -> actix_web::test::TestRequest {
        test::TestRequest::get()
            .uri("/")
            .peer_addr(addr.parse().unwrap())
    }

    #[actix_web::test]
    async fn each_ip_gets_its_own_budget() {
        let app = test::init_service(
            App::new()
                .wrap(IpRateLimiter::new(2))
                .route("/", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        for _ in 0..2 {
            let res = test::call_service(&app, from("10.0.0.1:4000").to_request()).await;
            assert_eq!(res.status(), StatusCode::OK);
        }
        let res = test::call_service(&app, from("10.0.0.1:4001").to_request()).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

        let res = test::call_service(&app, from("10.0.0.2:4000").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
    }
}
