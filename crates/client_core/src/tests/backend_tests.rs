use super::*;

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct ServerState {
    authorizations: Arc<Mutex<Vec<Option<String>>>>,
    created: Arc<Mutex<Vec<Value>>>,
    deleted: Arc<Mutex<Vec<String>>>,
}

fn user_json() -> Value {
    json!({
        "_id": "u1",
        "name": "Ann",
        "email": "ann@example.com",
        "createdAt": "2024-01-01T12:00:00Z"
    })
}

fn blog_json(id: &str, title: &str) -> Value {
    json!({
        "_id": id,
        "title": title,
        "content": "Hello world",
        "excerpt": "Hello world",
        "author": { "_id": "u1", "name": "Ann", "email": "ann@example.com" },
        "tags": ["rust"],
        "published": true,
        "createdAt": "2024-01-01T12:00:00Z",
        "updatedAt": "2024-01-01T12:00:00Z"
    })
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

async fn login(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["password"] == "secret" {
        (
            StatusCode::OK,
            Json(json!({ "data": { "user": user_json(), "token": "tok-1" } })),
        )
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Invalid credentials" })),
        )
    }
}

async fn whoami(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    match bearer(&headers).as_deref() {
        Some("Bearer tok-1") => (
            StatusCode::OK,
            Json(json!({ "data": { "user": user_json(), "blogs": [blog_json("p1", "Hi")] } })),
        ),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Not authorized, token failed" })),
        ),
    }
}

async fn list_blogs(State(state): State<ServerState>, headers: HeaderMap) -> Json<Value> {
    state.authorizations.lock().await.push(bearer(&headers));
    Json(json!({ "data": { "blogs": [blog_json("p1", "Hi"), blog_json("p2", "Second")] } }))
}

async fn create_blog(
    State(state): State<ServerState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let title = body["title"].as_str().unwrap_or_default().to_string();
    state.created.lock().await.push(body);
    (
        StatusCode::CREATED,
        Json(json!({ "data": { "blog": blog_json("p9", &title) } })),
    )
}

async fn delete_blog(State(state): State<ServerState>, Path(id): Path<String>) -> StatusCode {
    state.deleted.lock().await.push(id);
    StatusCode::OK
}

async fn fetch_missing() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": "Blog not found" })),
    )
}

async fn spawn_blog_server() -> anyhow::Result<(String, ServerState)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState::default();
    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/users/me", get(whoami))
        .route("/api/blogs", get(list_blogs).post(create_blog))
        .route("/api/blogs/:id", delete(delete_blog).get(fetch_missing))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}/api"), state))
}

fn backend_for(base_url: &str) -> HttpBackend {
    HttpBackend::with_client(Client::new(), base_url).expect("backend")
}

#[tokio::test]
async fn login_decodes_wrapped_payload() {
    let (base_url, _state) = spawn_blog_server().await.expect("server");
    let backend = backend_for(&base_url);

    let payload = backend
        .login(LoginRequest {
            email: "ann@example.com".into(),
            password: "secret".into(),
        })
        .await
        .expect("login");

    assert_eq!(payload.token, "tok-1");
    assert_eq!(payload.user.id.as_str(), "u1");
    assert_eq!(payload.user.display_name, "Ann");
}

#[tokio::test]
async fn rejected_login_carries_server_message() {
    let (base_url, _state) = spawn_blog_server().await.expect("server");
    let backend = backend_for(&base_url);

    let err = backend
        .login(LoginRequest {
            email: "ann@example.com".into(),
            password: "wrong".into(),
        })
        .await
        .expect_err("login should fail");

    assert!(matches!(err, BackendError::Rejected { status: 400, .. }));
    assert_eq!(err.server_message(), Some("Invalid credentials"));
    assert!(!err.is_stale_credentials());
}

#[tokio::test]
async fn unauthorized_maps_to_stale_credentials() {
    let (base_url, _state) = spawn_blog_server().await.expect("server");
    let backend = backend_for(&base_url);

    let err = backend.whoami("expired").await.expect_err("whoami should fail");

    assert!(err.is_stale_credentials());
    assert_eq!(err.server_message(), Some("Not authorized, token failed"));
}

#[tokio::test]
async fn whoami_returns_authored_posts() {
    let (base_url, _state) = spawn_blog_server().await.expect("server");
    let backend = backend_for(&base_url);

    let payload = backend.whoami("tok-1").await.expect("whoami");

    assert_eq!(payload.user.email, "ann@example.com");
    let authored = payload.blogs.expect("authored posts");
    assert_eq!(authored.len(), 1);
    assert_eq!(authored[0].author_ref.id.as_str(), "u1");
}

#[tokio::test]
async fn list_sends_bearer_token_when_present() {
    let (base_url, state) = spawn_blog_server().await.expect("server");
    let backend = backend_for(&base_url);

    let posts = backend.list_posts(Some("tok-1")).await.expect("list");
    backend.list_posts(None).await.expect("anonymous list");

    assert_eq!(posts.len(), 2);
    assert_eq!(posts[1].title, "Second");
    assert_eq!(posts[0].tags, vec!["rust".to_string()]);
    assert_eq!(
        *state.authorizations.lock().await,
        vec![Some("Bearer tok-1".to_string()), None]
    );
}

#[tokio::test]
async fn create_posts_wire_field_names() {
    let (base_url, state) = spawn_blog_server().await.expect("server");
    let backend = backend_for(&base_url);

    let created = backend
        .create_post(
            Some("tok-1"),
            NewPost {
                title: "Hi".into(),
                content: "Hello world".into(),
                excerpt: "Hello world".into(),
                tags: vec!["rust".into()],
            },
        )
        .await
        .expect("create");

    assert_eq!(created.id.as_str(), "p9");
    assert_eq!(created.title, "Hi");
    let sent = state.created.lock().await;
    assert_eq!(sent[0]["content"], "Hello world");
    assert_eq!(sent[0]["excerpt"], "Hello world");
}

#[tokio::test]
async fn delete_targets_post_path() {
    let (base_url, state) = spawn_blog_server().await.expect("server");
    let backend = backend_for(&base_url);

    backend
        .delete_post(Some("tok-1"), &PostId::new("p1"))
        .await
        .expect("delete");

    assert_eq!(*state.deleted.lock().await, vec!["p1".to_string()]);
}

#[tokio::test]
async fn not_found_is_a_remote_rejection() {
    let (base_url, _state) = spawn_blog_server().await.expect("server");
    let backend = backend_for(&base_url);

    let err = backend
        .fetch_post(None, &PostId::new("missing"))
        .await
        .expect_err("fetch should fail");

    assert!(matches!(err, BackendError::Rejected { status: 404, .. }));
    assert_eq!(err.server_message(), Some("Blog not found"));
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let backend = backend_for(&format!("http://{addr}/api"));

    let err = backend.list_posts(None).await.expect_err("list should fail");

    assert!(err.is_transport());
    assert_eq!(err.server_message(), None);
}

#[test]
fn rejects_unparseable_base_url() {
    assert!(HttpBackend::with_client(Client::new(), "not a url").is_err());
}
