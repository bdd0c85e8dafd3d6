//! HTTP front door: `POST /chat` into the dispatcher, static files for everything else.

use crate::config::ServerConfig;
use crate::conversation::DEFAULT_SESSION;
use crate::dispatcher::{Coordinates, Dispatcher, IncomingRequest, Reply, DEFAULT_LANGUAGE};
use crate::error::{AgentError, AgentResult};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName, Method},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

pub const SESSION_HEADER: &str = "x-session-id";

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
}

/// Wire shape of a chat request.
#[derive(Deserialize, Debug, Default)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Browser geolocation. Non-numeric values are ignored.
#[derive(Deserialize, Debug, Default)]
pub struct Location {
    #[serde(default)]
    pub latitude: Value,
    #[serde(default)]
    pub longitude: Value,
}

impl ChatRequest {
    pub fn into_request(self) -> IncomingRequest {
        let coordinates = self.location.and_then(|loc| {
            match (loc.latitude.as_f64(), loc.longitude.as_f64()) {
                (Some(lat), Some(lon)) => Some(Coordinates { lat, lon }),
                _ => None,
            }
        });

        IncomingRequest {
            text: self.message,
            image: self.image,
            language: self.lang.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            coordinates,
        }
    }
}

pub fn router(dispatcher: Arc<Dispatcher>, frontend_dir: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(SESSION_HEADER)]);

    Router::new()
        .route("/chat", post(chat_handler))
        .route("/health", get(health))
        .fallback_service(ServeDir::new(frontend_dir))
        .with_state(AppState { dispatcher })
        .layer(cors)
}

pub async fn serve(dispatcher: Arc<Dispatcher>, settings: &ServerConfig) -> AgentResult<()> {
    let app = router(dispatcher, &settings.frontend_dir);
    let listener = tokio::net::TcpListener::bind(&settings.bind).await?;

    tracing::info!("Agent running on http://{}", listener.local_addr()?);
    tracing::info!("Serving static files from {}", settings.frontend_dir);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "could not listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

async fn health() -> &'static str {
    "OK"
}

/// Always answers 200; failures travel in the `error` field.
async fn chat_handler(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Json<Reply> {
    let parsed: ChatRequest = match serde_json::from_slice(&body) {
        Ok(parsed) => parsed,
        Err(e) => {
            let error = AgentError::from(e);
            tracing::warn!(error = %error, "rejecting chat request");
            return Json(Reply::from_error(&error));
        }
    };

    let session = parsed
        .session_id
        .clone()
        .or_else(|| {
            headers
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SESSION.to_string());
    let request = parsed.into_request();

    // A panic inside one dispatch must not take the connection down with it.
    let dispatcher = state.dispatcher.clone();
    let reply = match tokio::spawn(async move { dispatcher.handle(&session, request).await }).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(error = %e, "dispatch task failed");
            Reply::Error {
                error: format!("Error: {}", e),
            }
        }
    };

    Json(reply)
}
