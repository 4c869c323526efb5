//! In-process mock backend: `/api/auth/*` и `/api/post/*` на случайном порту.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

pub const SEEDED_EMAIL: &str = "a@b.com";
pub const SEEDED_PASSWORD: &str = "x";
pub const SEEDED_TOKEN: &str = "abc";
pub const LOCKED_EMAIL: &str = "locked@b.com";

struct User {
    id: String,
    password: String,
    token: String,
}

#[derive(Default)]
struct BackendState {
    users: HashMap<String, User>,
    posts: Vec<Value>,
    authorization: Vec<(&'static str, Option<String>)>,
    all_posts_requests: usize,
    all_posts_delay: Option<Duration>,
}

#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<BackendState>>,
}

impl MockBackend {
    /// Бэкенд с пользователем `a@b.com` / `x` (токен `abc`) и одним постом.
    pub async fn seeded() -> Self {
        let backend = Self::default();
        {
            let mut state = backend.state.lock().await;
            state.users.insert(
                SEEDED_EMAIL.to_string(),
                User {
                    id: "user-1".to_string(),
                    password: SEEDED_PASSWORD.to_string(),
                    token: SEEDED_TOKEN.to_string(),
                },
            );
            state.posts.push(post_json("post-1", "user-1", "First", "sub", "hello"));
        }
        backend
    }

    /// Запускает сервер и возвращает базовый URL API.
    pub async fn start(&self) -> String {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock backend");
        let addr = listener.local_addr().expect("mock backend addr");
        let app = router(self.clone());

        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("mock backend must serve");
        });

        format!("http://{addr}/api")
    }

    /// `/post/all` снимает список постов при получении запроса и отвечает после паузы.
    pub async fn delay_all_posts(&self, delay: Duration) {
        self.state.lock().await.all_posts_delay = Some(delay);
    }

    pub async fn all_posts_requests(&self) -> usize {
        self.state.lock().await.all_posts_requests
    }

    pub async fn post_count(&self) -> usize {
        self.state.lock().await.posts.len()
    }

    /// Заголовки `Authorization`, полученные маршрутами `/post/*`, по порядку.
    pub async fn authorization_headers(&self) -> Vec<(&'static str, Option<String>)> {
        self.state.lock().await.authorization.clone()
    }
}

/// Адрес, на котором гарантированно никто не слушает.
pub async fn unreachable_api_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind throwaway listener");
    let addr = listener.local_addr().expect("throwaway listener addr");
    drop(listener);
    format!("http://{addr}/api")
}

pub fn unique_suffix() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock must be after unix epoch")
        .as_nanos();
    format!("{nanos}")
}

fn router(backend: MockBackend) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/post/all", get(all_posts))
        .route("/api/post/", get(personal_posts).post(create_post))
        .with_state(backend)
}

fn post_json(id: &str, author_id: &str, title: &str, subtitle: &str, content: &str) -> Value {
    let now = chrono::Utc::now().to_rfc3339();
    json!({
        "id": id,
        "createdAt": now,
        "updatedAt": now,
        "authorId": author_id,
        "title": title,
        "subtitle": subtitle,
        "content": content,
        "comments": []
    })
}

fn envelope(data: Value, success: bool, message: Option<&str>) -> Json<Value> {
    Json(json!({ "data": data, "success": success, "message": message }))
}

fn field<'a>(body: &'a Value, name: &str) -> &'a str {
    body.get(name).and_then(Value::as_str).unwrap_or_default()
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn user_id_for(state: &BackendState, authorization: Option<&str>) -> Option<String> {
    let token = authorization?.strip_prefix("Bearer ")?;
    state
        .users
        .values()
        .find(|user| user.token == token)
        .map(|user| user.id.clone())
}

async fn login(State(backend): State<MockBackend>, Json(body): Json<Value>) -> Response {
    let email = field(&body, "email");
    let password = field(&body, "password");

    if email == LOCKED_EMAIL {
        return (
            StatusCode::UNAUTHORIZED,
            envelope(Value::Null, false, Some("account locked")),
        )
            .into_response();
    }

    let state = backend.state.lock().await;
    match state.users.get(email) {
        Some(user) if user.password == password => {
            envelope(json!({ "token": user.token }), true, None).into_response()
        }
        _ => envelope(Value::Null, false, Some("invalid credentials")).into_response(),
    }
}

async fn register(State(backend): State<MockBackend>, Json(body): Json<Value>) -> Response {
    let email = field(&body, "email").to_string();
    let mut state = backend.state.lock().await;

    if state.users.contains_key(&email) {
        return envelope(Value::Null, false, Some("email taken")).into_response();
    }

    let id = format!("user-{}", state.users.len() + 1);
    state.users.insert(
        email.clone(),
        User {
            id: id.clone(),
            password: field(&body, "password").to_string(),
            token: format!("token-{id}"),
        },
    );
    envelope(json!({ "id": id, "email": email }), true, Some("registered")).into_response()
}

async fn all_posts(State(backend): State<MockBackend>, headers: HeaderMap) -> Response {
    let (posts, delay) = {
        let mut state = backend.state.lock().await;
        state.authorization.push(("all", bearer(&headers)));
        state.all_posts_requests += 1;
        (state.posts.clone(), state.all_posts_delay)
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    envelope(Value::Array(posts), true, None).into_response()
}

async fn personal_posts(State(backend): State<MockBackend>, headers: HeaderMap) -> Response {
    let authorization = bearer(&headers);
    let mut state = backend.state.lock().await;
    state.authorization.push(("personal", authorization.clone()));

    let Some(user_id) = user_id_for(&state, authorization.as_deref()) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "error": "unauthorized" })),
        )
            .into_response();
    };

    let mine: Vec<Value> = state
        .posts
        .iter()
        .filter(|post| post["authorId"] == user_id.as_str())
        .cloned()
        .collect();
    envelope(Value::Array(mine), true, None).into_response()
}

async fn create_post(
    State(backend): State<MockBackend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let authorization = bearer(&headers);
    let mut state = backend.state.lock().await;
    state.authorization.push(("create", authorization.clone()));

    let Some(user_id) = user_id_for(&state, authorization.as_deref()) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "error": "missing token" })),
        )
            .into_response();
    };

    let title = field(&body, "title");
    if title.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "title is required" })),
        )
            .into_response();
    }
    if title == "reject" {
        return envelope(Value::Null, false, Some("post rejected")).into_response();
    }

    let id = format!("post-{}", state.posts.len() + 1);
    let post = post_json(
        &id,
        &user_id,
        title,
        field(&body, "subtitle"),
        field(&body, "content"),
    );
    state.posts.push(post.clone());
    (StatusCode::CREATED, envelope(post, true, Some("created"))).into_response()
}
