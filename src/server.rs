//! Browser-facing HTTP surface.
//!
//! `/translate` answers with newline-delimited JSON: one `started` event, one
//! `language` event per target language in display order, one `persisted`
//! event. The page renders each line as it arrives.

use crate::auth::{Session, SessionRegistry};
use crate::parser;
use crate::session::{Orchestrator, SessionEvent};
use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const SESSION_COOKIE: &str = "session";
const INDEX_HTML: &str = include_str!("../static/index.html");

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
    pub orchestrator: Arc<Orchestrator>,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct TranslateRequest {
    xml: String,
}

#[derive(Debug, Serialize)]
struct SessionStatus {
    authenticated: bool,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/session", get(session_status))
        .route("/translate", post(translate))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Response {
    match state.sessions.login(&request.username, &request.password) {
        Some(session) => {
            let cookie = format!(
                "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
                SESSION_COOKIE,
                session.id,
                state.sessions.ttl().num_seconds()
            );
            (
                [(SET_COOKIE, cookie)],
                Json(SessionStatus {
                    authenticated: true,
                }),
            )
                .into_response()
        }
        None => error_response(StatusCode::UNAUTHORIZED, "Invalid username or password"),
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(id) = session_cookie(&headers) {
        if state.sessions.logout(&id) {
            info!("Session ended");
        }
    }

    let cleared = format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0",
        SESSION_COOKIE
    );
    (
        [(SET_COOKIE, cleared)],
        Json(SessionStatus {
            authenticated: false,
        }),
    )
        .into_response()
}

async fn session_status(State(state): State<AppState>, headers: HeaderMap) -> Json<SessionStatus> {
    Json(SessionStatus {
        authenticated: current_session(&state, &headers).is_some(),
    })
}

async fn translate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<TranslateRequest>,
) -> Response {
    let Some(session) = current_session(&state, &headers) else {
        return error_response(StatusCode::UNAUTHORIZED, "Login required");
    };

    let entries = match parser::parse(&request.xml) {
        Ok(entries) => entries,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };
    if entries.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "No <string name=\"...\"> lines found in the input",
        );
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let orchestrator = Arc::clone(&state.orchestrator);
    tokio::spawn(async move {
        orchestrator.run(&session, &entries, &tx).await;
    });

    let body = UnboundedReceiverStream::new(rx).map(|event| Ok::<_, Infallible>(ndjson_line(&event)));

    (
        [(CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(body),
    )
        .into_response()
}

fn current_session(state: &AppState, headers: &HeaderMap) -> Option<Session> {
    session_cookie(headers).and_then(|id| state.sessions.authorize(&id))
}

/// Value of the session cookie, if the browser sent one
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn ndjson_line(event: &SessionEvent) -> String {
    let mut line = serde_json::to_string(event).unwrap_or_else(|e| {
        error!("Failed to serialize session event: {}", e);
        serde_json::json!({ "type": "error", "error": e.to_string() }).to_string()
    });
    line.push('\n');
    line
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}
