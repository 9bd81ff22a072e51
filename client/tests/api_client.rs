use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use actix_web::{App, HttpRequest, HttpResponse, HttpServer, cookie::Cookie, web};
use chrono::Utc;
use client::ApiClient;
use common::error::{ApiResponse, ErrorCode};
use db::models::user::{AccountStatus, User, UserRole};
use serde_json::json;
use uuid::Uuid;

struct State {
    refreshes: AtomicUsize,
    /// Access token handed out by `/auth/refresh`.
    next_token: &'static str,
}

fn user() -> User {
    User {
        id: Uuid::new_v4(),
        email: "owner@gym.test".to_string(),
        username: None,
        full_name: "Nadia Owner".to_string(),
        phone: None,
        role: UserRole::Owner,
        is_onboarded: true,
        account_status: AccountStatus::Active,
        app_subscription_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn session_response(access_token: &str, refresh_token: &str) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(Cookie::build("refresh_token", refresh_token.to_string()).path("/api/auth").http_only(true).finish())
        .json(ApiResponse::ok(json!({ "accessToken": access_token, "user": user() })))
}

async fn login() -> HttpResponse {
    session_response("stale", "rt_good")
}

async fn refresh(req: HttpRequest, state: web::Data<State>) -> HttpResponse {
    state.refreshes.fetch_add(1, Ordering::SeqCst);
    match req.cookie("refresh_token") {
        Some(cookie) if cookie.value() == "rt_good" => session_response(state.next_token, "rt_next"),
        _ => HttpResponse::Unauthorized().json(ApiResponse::<()>::error(
            ErrorCode::InvalidRefreshToken,
            "Unknown refresh token",
        )),
    }
}

async fn me(req: HttpRequest) -> HttpResponse {
    let auth = req.headers().get("Authorization").and_then(|h| h.to_str().ok());
    if auth == Some("Bearer fresh") {
        HttpResponse::Ok().json(ApiResponse::ok(user()))
    } else {
        HttpResponse::Unauthorized().json(ApiResponse::<()>::error(ErrorCode::Unauthorized, "Token expired"))
    }
}

async fn spawn_server(next_token: &'static str) -> (String, Arc<State>) {
    let state = Arc::new(State {
        refreshes: AtomicUsize::new(0),
        next_token,
    });
    let data = web::Data::from(state.clone());
    let server = HttpServer::new(move || {
        App::new().app_data(data.clone()).service(
            web::scope("/api")
                .route("/auth/login", web::post().to(login))
                .route("/auth/refresh", web::post().to(refresh))
                .route("/user/me", web::get().to(me)),
        )
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .unwrap();
    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());
    (format!("http://{}/api", addr), state)
}

#[actix_web::test]
async fn expired_token_is_refreshed_once_and_retried() {
    let (base, state) = spawn_server("fresh").await;
    let client = ApiClient::new(&base).unwrap();

    let session = client.login("owner@gym.test", "password123").await.unwrap();
    assert_eq!(session.access_token, "stale");
    assert_eq!(client.refresh_token().as_deref(), Some("rt_good"));

    let me = client.me().await.unwrap();
    assert_eq!(me.email, "owner@gym.test");
    assert_eq!(state.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(client.access_token().as_deref(), Some("fresh"));
    assert_eq!(client.refresh_token().as_deref(), Some("rt_next"));
}

#[actix_web::test]
async fn second_unauthorized_is_returned_to_caller() {
    let (base, state) = spawn_server("still-stale").await;
    let client = ApiClient::new(&base).unwrap();
    client.set_access_token(Some("stale".to_string()));
    client.set_refresh_token(Some("rt_good".to_string()));

    let err = client.me().await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.code(), Some(ErrorCode::Unauthorized));
    assert_eq!(state.refreshes.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn failed_refresh_returns_original_error() {
    let (base, state) = spawn_server("fresh").await;
    let client = ApiClient::new(&base).unwrap();
    client.set_access_token(Some("stale".to_string()));
    client.set_refresh_token(Some("rt_revoked".to_string()));

    let err = client.me().await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::Unauthorized));
    assert_eq!(state.refreshes.load(Ordering::SeqCst), 1);
    assert!(client.refresh_token().is_none());
}

#[actix_web::test]
async fn no_refresh_without_cookie() {
    let (base, state) = spawn_server("fresh").await;
    let client = ApiClient::new(&base).unwrap();
    client.set_access_token(Some("stale".to_string()));

    assert!(client.me().await.unwrap_err().is_unauthorized());
    assert_eq!(state.refreshes.load(Ordering::SeqCst), 0);
}
