use std::net::{IpAddr, SocketAddr};

use actix_web::{HttpResponse, Responder, dev::ConnectionInfo};
use serde::Serialize;

use crate::error::{ApiResponse, Res};

/// Successful responses wrapped in the `ApiResponse` envelope.
pub struct Success;
impl Success {
    pub fn created<T: Serialize>(body: T) -> Res<impl Responder> {
        Result::Ok(HttpResponse::Created().json(ApiResponse::ok(body)))
    }
    pub fn ok<T: Serialize>(body: T) -> Res<impl Responder> {
        Result::Ok(HttpResponse::Ok().json(ApiResponse::ok(body)))
    }
    pub fn message(message: &str) -> Res<impl Responder> {
        Result::Ok(HttpResponse::Ok().json(ApiResponse::<()> {
            success: true,
            data: None,
            message: Some(message.to_string()),
            error_code: None,
        }))
    }
}

/// Client address, honouring `Forwarded`/`X-Forwarded-For` set by a proxy.
pub fn client_ip(info: &ConnectionInfo) -> Option<IpAddr> {
    let raw = info.realip_remote_addr()?;
    raw.parse::<IpAddr>()
        .ok()
        .or_else(|| raw.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}
