use std::sync::Arc;

use actix_web::{HttpRequest, Responder, get, web};
use common::{
    error::Res,
    http::{Success, client_ip},
};

use crate::services::detector::{COUNTRY_HEADER, HeaderLookup, LookupQuery, RegionDetector};

pub type ServerDetector = RegionDetector<HeaderLookup>;

/// Detects the caller's region from their address.
///
/// Private and loopback addresses resolve to the default region (Algeria,
/// DZD).
///
/// # Output
/// - Success: `{ region, regionName, currency, timezone }`
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/region');
/// const { data } = await response.json();
/// // { region: 'DZ', regionName: 'Algeria', currency: 'DZD', timezone: 'Africa/Algiers' }
/// ```
#[get("")]
pub async fn get_region(
    req: HttpRequest,
    detector: web::Data<Arc<ServerDetector>>,
) -> Res<impl Responder> {
    let query = LookupQuery {
        ip: client_ip(&req.connection_info()),
        country_header: req
            .headers()
            .get(COUNTRY_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string),
    };
    let region = detector.detect(query).await;
    Success::ok(region)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, test};
    use chrono::Duration;
    use serde_json::Value;

    async fn call(peer: &str, country: Option<&str>) -> Value {
        let detector = Arc::new(RegionDetector::new(HeaderLookup, Duration::hours(24)));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(detector))
                .service(web::scope("/region").service(get_region)),
        )
        .await;

        let mut req = test::TestRequest::get()
            .uri("/region")
            .peer_addr(peer.parse().unwrap());
        if let Some(country) = country {
            req = req.insert_header((COUNTRY_HEADER, country));
        }
        test::call_and_read_body_json(&app, req.to_request()).await
    }

    #[actix_web::test]
    async fn public_address_uses_cdn_country() {
        let body = call("81.2.69.160:5000", Some("FR")).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["region"], "FR");
        assert_eq!(body["data"]["currency"], "EUR");
        assert_eq!(body["data"]["timezone"], "Europe/Paris");
    }

    #[actix_web::test]
    async fn loopback_falls_back_to_default_region() {
        let body = call("127.0.0.1:5000", Some("FR")).await;
        assert_eq!(body["data"]["region"], "DZ");
        assert_eq!(body["data"]["regionName"], "Algeria");
        assert_eq!(body["data"]["currency"], "DZD");
    }
}
