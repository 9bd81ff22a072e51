use std::sync::RwLock;

use common::{
    error::{ApiResponse, ErrorCode},
    token::REFRESH_COOKIE,
};
use reqwest::{
    Method, Response, StatusCode,
    header::{COOKIE, SET_COOKIE},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::{error::ClientError, models::Session};

/// HTTP client holding the current access token and refresh cookie.
///
/// Safe to share between tasks; tokens are swapped under a lock that is
/// never held across a request.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    access_token: RwLock<Option<String>>,
    refresh_cookie: RwLock<Option<String>>,
}

impl ApiClient {
    /// `base_url` points at the API root, e.g. `https://app.example.com/api`.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_http(reqwest::Client::new(), base_url)
    }

    pub fn with_http(http: reqwest::Client, base_url: &str) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http,
            base_url,
            access_token: RwLock::new(None),
            refresh_cookie: RwLock::new(None),
        })
    }

    pub fn access_token(&self) -> Option<String> {
        self.access_token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().unwrap_or_else(|e| e.into_inner()) = token;
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.refresh_cookie
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_refresh_token(&self, token: Option<String>) {
        *self.refresh_cookie.write().unwrap_or_else(|e| e.into_inner()) = token;
    }

    pub(crate) fn clear_session(&self) {
        self.set_access_token(None);
        self.set_refresh_token(None);
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Sends one request with the current access token and refresh cookie.
    pub(crate) async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Response, ClientError> {
        let mut req = self.http.request(method, self.url(path)?);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(token) = self.access_token() {
            req = req.bearer_auth(token);
        }
        if let Some(cookie) = self.refresh_token() {
            req = req.header(COOKIE, format!("{}={}", REFRESH_COOKIE, cookie));
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let res = req.send().await?;
        self.store_refresh_cookie(&res);
        Ok(res)
    }

    /// Sends an authenticated request. A 401 triggers one refresh and one
    /// retry; if the refresh fails the original 401 is returned.
    pub(crate) async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<T, ClientError> {
        let res = self.execute(method.clone(), path, query, body.as_ref()).await?;
        if res.status() != StatusCode::UNAUTHORIZED || self.refresh_token().is_none() {
            return decode(res).await;
        }

        match self.refresh_session().await {
            Ok(_) => {
                let retry = self.execute(method, path, query, body.as_ref()).await?;
                decode(retry).await
            }
            Err(e) => {
                log::debug!("Token refresh failed: {}", e);
                decode(res).await
            }
        }
    }

    /// Exchanges the refresh cookie for a new access token.
    pub async fn refresh_session(&self) -> Result<Session, ClientError> {
        let res = self.execute(Method::POST, "auth/refresh", &[], None).await?;
        match decode::<Session>(res).await {
            Ok(session) => {
                self.set_access_token(Some(session.access_token.clone()));
                Ok(session)
            }
            Err(e) => {
                if e.is_unauthorized() {
                    self.clear_session();
                }
                Err(e)
            }
        }
    }

    fn store_refresh_cookie(&self, res: &Response) {
        for header in res.headers().get_all(SET_COOKIE) {
            let Ok(raw) = header.to_str() else {
                continue;
            };
            if let Some(value) = refresh_cookie_value(raw) {
                self.set_refresh_token((!value.is_empty()).then(|| value.to_string()));
            }
        }
    }
}

/// Value of a `refresh_token` `Set-Cookie` header. An empty value is a
/// removal.
fn refresh_cookie_value(set_cookie: &str) -> Option<&str> {
    let pair = set_cookie.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    (name == REFRESH_COOKIE).then(|| value.trim_matches('"'))
}

/// Unwraps the `ApiResponse` envelope.
pub(crate) async fn decode<T: DeserializeOwned>(res: Response) -> Result<T, ClientError> {
    let status = res.status().as_u16();
    let bytes = res.bytes().await?;
    if !(200..300).contains(&status) {
        return Err(api_error(status, &bytes));
    }

    let envelope: ApiResponse<Value> =
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))?;
    if !envelope.success {
        return Err(ClientError::Api {
            status,
            code: envelope.error_code.unwrap_or(ErrorCode::UnknownError),
            message: envelope.message.unwrap_or_default(),
        });
    }
    serde_json::from_value(envelope.data.unwrap_or(Value::Null))
        .map_err(|e| ClientError::Decode(e.to_string()))
}

/// Error for a non-2xx response. Bodies without an envelope fall back to
/// the status code table.
pub(crate) fn api_error(status: u16, body: &[u8]) -> ClientError {
    let envelope = serde_json::from_slice::<ApiResponse<Value>>(body).ok();
    let code = envelope
        .as_ref()
        .and_then(|e| e.error_code)
        .unwrap_or_else(|| ErrorCode::from_status(status));
    let message = envelope.and_then(|e| e.message).unwrap_or_else(|| {
        StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Request failed")
            .to_string()
    });
    ClientError::Api {
        status,
        code,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(err: ClientError) -> (u16, ErrorCode, String) {
        match err {
            ClientError::Api {
                status,
                code,
                message,
            } => (status, code, message),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn envelope_code_wins_over_status() {
        let body = br#"{"success":false,"errorCode":"CLASS_FULL","message":"Class is full"}"#;
        assert_eq!(
            parts(api_error(409, body)),
            (409, ErrorCode::ClassFull, "Class is full".to_string())
        );
    }

    #[test]
    fn bare_status_maps_through_table() {
        let (_, code, message) = parts(api_error(404, b""));
        assert_eq!(code, ErrorCode::NotFound);
        assert_eq!(message, "Not Found");

        assert_eq!(parts(api_error(422, b"<html>")).1, ErrorCode::ValidationError);
        assert_eq!(parts(api_error(418, b"")).1, ErrorCode::UnknownError);
    }

    #[test]
    fn refresh_cookie_is_read_from_set_cookie() {
        assert_eq!(
            refresh_cookie_value("refresh_token=rt_abc; Path=/api/auth; HttpOnly"),
            Some("rt_abc")
        );
        assert_eq!(refresh_cookie_value("refresh_token=; Max-Age=0"), Some(""));
        assert_eq!(refresh_cookie_value("session=xyz; Path=/"), None);
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let client = ApiClient::new("http://localhost:8080/api").unwrap();
        assert_eq!(
            client.url("/auth/login").unwrap().as_str(),
            "http://localhost:8080/api/auth/login"
        );
    }
}
