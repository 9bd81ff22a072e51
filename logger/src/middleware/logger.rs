use actix_web::{
    Error, HttpMessage,
    body::MessageBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use colored::Colorize;
use common::{error::Res, jwt::JwtClaims};
use futures::future::{LocalBoxFuture, Ready, ready};
use log::info;
use std::{rc::Rc, time::Instant};

pub struct LoggerMiddleware {
    enabled: bool,
}

impl LoggerMiddleware {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = LoggerMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(LoggerMiddlewareService {
            service: Rc::new(service),
            enabled: self.enabled,
        }))
    }
}

pub struct LoggerMiddlewareService<S> {
    service: Rc<S>,
    enabled: bool,
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = Rc::clone(&self.service);
        if !self.enabled {
            return Box::pin(async move { srv.call(req).await });
        }

        let method = req.method().to_string();
        let path = req.path().to_string();
        let query = req.query_string().to_string();
        let started = Instant::now();

        Box::pin(async move {
            let res = srv.call(req).await?;

            // the extractor runs inside this middleware, so claims are read afterwards
            let user_id = res
                .request()
                .extensions()
                .get::<Res<JwtClaims>>()
                .and_then(|claims| claims.as_ref().ok())
                .map(|claims| claims.user_id.to_string());

            let status_code = res.status().as_u16();
            let colored_status = match status_code {
                200..=299 => status_code.to_string().green(),
                300..=399 => status_code.to_string().yellow(),
                400..=499 => status_code.to_string().bright_red(),
                _ => status_code.to_string().red(),
            };
            let colored_method = match method.as_str() {
                "GET" => method.blue(),
                "POST" => method.yellow(),
                "PUT" => method.purple(),
                "DELETE" => method.red(),
                _ => method.normal(),
            };

            info!(
                "[{}] {} {}{} {} user_id={}",
                colored_status,
                colored_method,
                path.bright_white(),
                if query.is_empty() { String::new() } else { format!("?{}", query) }.bright_cyan(),
                format!("({}ms)", started.elapsed().as_millis()).bright_black(),
                user_id.unwrap_or_else(|| "None".to_string()).bright_blue(),
            );

            Ok(res)
        })
    }
}
