use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use deskmate::command::{CommandRunner, ExecutionResult};
use deskmate::config::ShellKind;
use deskmate::conversation::Turn;
use deskmate::dispatcher::Dispatcher;
use deskmate::server::{router, SESSION_HEADER};
use deskmate::skills::SkillAdapters;
use serde_json::{json, Value};
use std::io;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

struct StubSkills;

#[async_trait]
impl SkillAdapters for StubSkills {
    async fn weather_by_coordinates(&self, lat: f64, lon: f64) -> String {
        format!("Weather at {},{}", lat, lon)
    }

    async fn weather_by_city(&self, city: &str) -> String {
        format!("Weather in {}", city)
    }

    async fn reverse_geocode(&self, _lat: f64, _lon: f64) -> String {
        "Jaipur".to_string()
    }

    async fn news_headlines(&self) -> String {
        "News unavailable.".to_string()
    }

    async fn video_link(&self, _message: &str) -> String {
        "https://www.youtube.com".to_string()
    }

    async fn web_search_snippet(&self, _query: &str) -> String {
        "Search unavailable.".to_string()
    }

    async fn describe_image(&self, _text: Option<&str>, _image: &str) -> String {
        "An empty room.".to_string()
    }

    async fn chat_completion(&self, _system_prompt: &str, history: &[Turn], _user: &str) -> String {
        format!("[LANG:en-US] history={}", history.len())
    }
}

struct NoopRunner;

#[async_trait]
impl CommandRunner for NoopRunner {
    async fn run(&self, _command_line: &str) -> io::Result<ExecutionResult> {
        Ok(ExecutionResult::default())
    }

    fn shell(&self) -> ShellKind {
        ShellKind::Sh
    }
}

fn app(frontend_dir: &str) -> Router {
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(StubSkills), Arc::new(NoopRunner)));
    router(dispatcher, frontend_dir)
}

fn chat_post(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/chat")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_chat_returns_reply_and_lang() {
    let response = app("./frontend")
        .oneshot(chat_post(
            json!({
                "message": "where am i",
                "lang": "hi-IN",
                "location": {"latitude": 26.9, "longitude": 75.8}
            })
            .to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"reply": "Near Jaipur", "lang": "hi-IN"})
    );
}

#[tokio::test]
async fn test_malformed_body_is_an_error_reply() {
    let response = app("./frontend").oneshot(chat_post("{not json")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("Error: malformed request body"), "{}", error);
    assert!(body.get("reply").is_none());
}

#[tokio::test]
async fn test_empty_message_is_an_error_reply() {
    let response = app("./frontend")
        .oneshot(chat_post(json!({"message": "  "}).to_string()))
        .await
        .unwrap();

    assert_eq!(
        json_body(response).await,
        json!({"error": "Error: request carries neither a message nor an image"})
    );
}

#[tokio::test]
async fn test_session_header_keeps_history_apart() {
    let app = app("./frontend");

    let mut replies = Vec::new();
    for session in ["alpha", "alpha", "beta"] {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/chat")
            .header("content-type", "application/json")
            .header(SESSION_HEADER, session)
            .body(Body::from(json!({"message": "hello"}).to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        replies.push(json_body(response).await["reply"].clone());
    }

    assert_eq!(replies[0], json!("[LANG:en-US] history=0"));
    assert_eq!(replies[1], json!("[LANG:en-US] history=2"));
    assert_eq!(replies[2], json!("[LANG:en-US] history=0"));
}

#[tokio::test]
async fn test_body_session_id_wins_over_header() {
    let app = app("./frontend");

    for _ in 0..2 {
        app.clone()
            .oneshot(chat_post(json!({"message": "hi", "session_id": "body"}).to_string()))
            .await
            .unwrap();
    }

    let request = Request::builder()
        .method(Method::POST)
        .uri("/chat")
        .header(SESSION_HEADER, "header")
        .body(Body::from(json!({"message": "hi", "session_id": "body"}).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(json_body(response).await["reply"], json!("[LANG:en-US] history=4"));
}

#[tokio::test]
async fn test_health() {
    let response = app("./frontend")
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_cors_preflight_allows_any_origin() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/chat")
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .body(Body::empty())
        .unwrap();

    let response = app("./frontend").oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_static_files_are_served() -> Result<(), Box<dyn std::error::Error>> {
    let frontend = TempDir::new()?;
    std::fs::write(frontend.path().join("index.html"), "<h1>deskmate</h1>")?;
    let app = app(frontend.path().to_str().unwrap());

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/index.html").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    assert_eq!(&bytes[..], b"<h1>deskmate</h1>");

    let response = app
        .oneshot(Request::builder().uri("/missing.js").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}
