//! api-server: HTTP API for community event submissions.
//!
//! Accepts third-party event submissions, runs them through the domain's
//! validation-and-sanitization gate, and stores the ones that pass.
//! - `POST /api/events`: submit an event (JSON object).
//! - `GET /api/events`: list submitted events, newest first.
//! - `GET /api/events/:id`: fetch one submitted event.
//!
//! Storage is in-memory or SQLite (file) when the `sqlite` feature is enabled.
//! Rejections are logged here with the failing field; the domain gate itself
//! stays silent.
//!
//! Run:
//! ```bash
//! # pretty logs (default); PORT optional
//! cargo run -p api-server
//!
//! # json logs, throwaway storage
//! LOG_FORMAT=json STORAGE_PROVIDER=memory cargo run -p api-server
//! ```
//!
//! Configuration: See `config.rs` for all environment variables.
//!

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::HeaderValue;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use domain::adapters::memory_repo::InMemoryEventRepo;
use domain::service::EventService;
use domain::submission::EventSubmission;
use domain::{Clock, CoreError, EventRepository, NewEvent, StoredEvent};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Local repo abstraction supporting memory or sqlite (feature-gated).
enum AnyRepo {
    Memory(InMemoryEventRepo),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite_adapter::SqliteEventRepo),
}

impl AnyRepo {
    fn memory() -> Self {
        Self::Memory(InMemoryEventRepo::new())
    }

    #[cfg(feature = "sqlite")]
    fn sqlite(cfg: &config::Config) -> Result<Self, CoreError> {
        let repo = match &cfg.db_path {
            Some(path) => sqlite_adapter::SqliteEventRepo::open(path)?,
            None => sqlite_adapter::SqliteEventRepo::from_env()?,
        };
        Ok(Self::Sqlite(repo))
    }
}

impl EventRepository for AnyRepo {
    fn insert(&self, event: NewEvent) -> Result<StoredEvent, CoreError> {
        match self {
            AnyRepo::Memory(r) => r.insert(event),
            #[cfg(feature = "sqlite")]
            AnyRepo::Sqlite(r) => r.insert(event),
        }
    }

    fn get(&self, id: u64) -> Result<Option<StoredEvent>, CoreError> {
        match self {
            AnyRepo::Memory(r) => r.get(id),
            #[cfg(feature = "sqlite")]
            AnyRepo::Sqlite(r) => r.get(id),
        }
    }

    fn list(&self, limit: usize) -> Result<Vec<StoredEvent>, CoreError> {
        match self {
            AnyRepo::Memory(r) => r.list(limit),
            #[cfg(feature = "sqlite")]
            AnyRepo::Sqlite(r) => r.list(limit),
        }
    }
}

#[derive(Clone)]
struct StdClock;
impl Clock for StdClock {
    fn now(&self) -> std::time::SystemTime {
        std::time::SystemTime::now()
    }
}

#[derive(Clone)]
struct AppState {
    service: Arc<EventService<AnyRepo, StdClock>>,
}

impl AppState {
    fn new(repo: AnyRepo) -> Self {
        Self {
            service: Arc::new(EventService::new(repo, StdClock)),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load and validate config first (fail fast on misconfiguration)
    let cfg = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&cfg);
    cfg.warn_if_ephemeral();

    let state = AppState::new(build_repo(&cfg));

    // Request ID header name
    let x_request_id = axum::http::HeaderName::from_static("x-request-id");

    let mut app = routes()
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
        .with_state(state);

    // CORS - already validated in Config::from_env()
    let cors = if cfg.cors_allow_origin == HeaderValue::from_static("*") {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list([cfg.cors_allow_origin.clone()]))
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    };
    app = app.layer(cors);

    let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    info!(%addr, "api-server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind port");
    axum::serve(listener, app).await.expect("server error");
}

fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/events",
            get(list_events).post(create_event).options(preflight),
        )
        .route("/api/events/:id", get(get_event).options(preflight))
}

fn init_tracing(cfg: &config::Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        config::LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
        config::LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
    }
}

// Construct a repository instance based on config and feature flags.
fn build_repo(cfg: &config::Config) -> AnyRepo {
    match cfg.storage_provider {
        #[cfg(feature = "sqlite")]
        config::StorageProvider::Sqlite => match AnyRepo::sqlite(cfg) {
            Ok(r) => r,
            Err(e) => {
                error!(err = %e, "failed to open sqlite storage, falling back to memory");
                AnyRepo::memory()
            }
        },
        _ => AnyRepo::memory(),
    }
}

#[derive(Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

#[derive(Serialize)]
struct EventOut {
    id: u64,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    organization: String,
    location: String,
    date: String,
    time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    price: Option<f64>,
    link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kids: Option<bool>,
    email: String,
    date_submitted: String,
    submitted_at: String,
}

#[derive(Serialize)]
struct ListOut {
    events: Vec<EventOut>,
    count: usize,
}

fn event_to_out(event: StoredEvent) -> EventOut {
    EventOut {
        id: event.id,
        name: event.name,
        description: event.description,
        organization: event.organization,
        location: event.location,
        date: event.date,
        time: event.time,
        price: event.price,
        link: event.link,
        kids: event.kids,
        email: event.email,
        date_submitted: http_common::system_time_to_date(event.submitted_at),
        submitted_at: http_common::system_time_to_rfc3339(event.submitted_at),
    }
}

// Map a domain error to the client-facing response, logging why.
fn error_response(err: CoreError) -> Response {
    match err {
        CoreError::MissingField(field) => {
            info!(field, "submission rejected: missing required input");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(http_common::json_err("missing_required")),
            )
                .into_response()
        }
        CoreError::InvalidField(field) => {
            info!(field, "submission rejected: invalid input");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(http_common::json_err("invalid_input")),
            )
                .into_response()
        }
        CoreError::AlreadyExists => {
            info!("submission rejected: duplicate event");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(http_common::json_err("already_submitted")),
            )
                .into_response()
        }
        CoreError::NotFound => (
            StatusCode::NOT_FOUND,
            Json(http_common::json_err("not_found")),
        )
            .into_response(),
        CoreError::Repository(msg) => {
            error!(err = %msg, "storage error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(http_common::json_err("internal")),
            )
                .into_response()
        }
    }
}

async fn create_event(State(state): State<AppState>, body: Bytes) -> Response {
    let submission: EventSubmission = match serde_json::from_slice(&body) {
        Ok(s) => s,
        Err(e) => {
            warn!(err = %e, "unparseable submission body");
            return (
                StatusCode::BAD_REQUEST,
                Json(http_common::json_error_with_message(
                    "bad_request",
                    "request body must be a JSON object",
                )),
            )
                .into_response();
        }
    };

    match state.service.submit(&submission) {
        Ok(event) => {
            info!(id = event.id, date = %event.date, "event submitted");
            (StatusCode::OK, Json(event_to_out(event))).into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn list_events(State(state): State<AppState>, Query(q): Query<ListQuery>) -> Response {
    let limit = match q.limit {
        Some(n) if (1..=500).contains(&n) => n,
        Some(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(http_common::json_error_with_message(
                    "bad_request",
                    "limit must be between 1 and 500",
                )),
            )
                .into_response()
        }
        None => 50, // default
    };

    match state.service.list(limit) {
        Ok(events) => {
            let events: Vec<EventOut> = events.into_iter().map(event_to_out).collect();
            let count = events.len();
            (StatusCode::OK, Json(ListOut { events, count })).into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn get_event(State(state): State<AppState>, Path(id): Path<u64>) -> Response {
    match state.service.get(id) {
        Ok(event) => (StatusCode::OK, Json(event_to_out(event))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn preflight() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    fn app() -> Router {
        routes().with_state(AppState::new(AnyRepo::memory()))
    }

    fn submission_json() -> serde_json::Value {
        serde_json::json!({
            "name": "Spring <Fair> 🎉",
            "description": "Food & games",
            "organization": "Parks Dept",
            "location": "Riverside Park",
            "date": "2026-06-20",
            "time": "09:00",
            "price": 15,
            "link": "https://example.com/fair",
            "kids": true,
            "email": "info@example.com"
        })
    }

    fn post(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/events")
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn submit_list_and_get_flow() {
        let router = app();

        let resp = router
            .clone()
            .oneshot(post(submission_json().to_string()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let created = json_body(resp).await;
        assert_eq!(created["name"], "Spring &lt;Fair&gt; ");
        assert_eq!(created["description"], "Food &amp; games");
        assert_eq!(created["kids"], true);
        let id = created["id"].as_u64().unwrap();

        let resp = router.clone().oneshot(get_req("/api/events")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let listed = json_body(resp).await;
        assert_eq!(listed["count"], 1);
        assert_eq!(listed["events"][0]["id"], id);

        let resp = router
            .clone()
            .oneshot(get_req(&format!("/api/events/{id}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = router
            .clone()
            .oneshot(get_req("/api/events/999"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_required_is_422() {
        let mut body = submission_json();
        body["email"] = serde_json::Value::Null;
        let resp = app().oneshot(post(body.to_string())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(resp).await["error"]["code"], "missing_required");
    }

    #[tokio::test]
    async fn invalid_field_is_422() {
        let mut body = submission_json();
        body["date"] = "2025-12-31".into();
        let resp = app().oneshot(post(body.to_string())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(resp).await["error"]["code"], "invalid_input");

        let mut body = submission_json();
        body["kids"] = 1.into();
        let resp = app().oneshot(post(body.to_string())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn duplicate_is_422() {
        let router = app();
        let resp = router
            .clone()
            .oneshot(post(submission_json().to_string()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let resp = router
            .clone()
            .oneshot(post(submission_json().to_string()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(resp).await["error"]["code"], "already_submitted");
    }

    #[tokio::test]
    async fn structural_errors_are_400() {
        for body in ["not json", "[1, 2, 3]", "\"event\""] {
            let resp = app().oneshot(post(body)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body {body:?}");
        }
    }

    #[tokio::test]
    async fn list_limit_bounds() {
        let resp = app().oneshot(get_req("/api/events?limit=0")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let resp = app().oneshot(get_req("/api/events?limit=501")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let resp = app().oneshot(get_req("/api/events?limit=500")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn preflight_is_no_content() {
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/api/events")
            .body(Body::empty())
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }
}
