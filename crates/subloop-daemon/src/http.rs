//! HTTP transport: JSON-RPC endpoint, event stream and health check.
//!
//! Every RPC call carries an `Authorization: Bearer` token. The event
//! stream also accepts the token as a `token` query parameter because
//! browser `EventSource` cannot set headers.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::Stream;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use subloop_db::queries::roles;
use subloop_types::events::Event;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::auth::Claims;
use crate::commands::profile::ensure_profile;
use crate::events::EventFilter;
use crate::rpc::{dispatch_request, Caller, RpcError, RpcRequest, RpcResponse};
use crate::{unix_now, DaemonState};

/// Client-supplied device fingerprint header.
pub const DEVICE_FINGERPRINT_HEADER: &str = "x-device-fingerprint";

const MAX_FINGERPRINT_LEN: usize = 255;
const KEEP_ALIVE_SECS: u64 = 15;

/// Build the application router.
pub fn router(state: Arc<DaemonState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);
    Router::new()
        .route("/rpc", post(rpc_handler))
        .route("/events", get(events_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS for the configured origins. `"*"` allows any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(values)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static(DEVICE_FINGERPRINT_HEADER),
        ])
        .max_age(Duration::from_secs(60 * 60))
}

fn rpc_failure(status: StatusCode, error: RpcError) -> Response {
    (status, Json(RpcResponse::error(Value::Null, error))).into_response()
}

fn device_fingerprint(headers: &HeaderMap) -> Option<String> {
    headers
        .get(DEVICE_FINGERPRINT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= MAX_FINGERPRINT_LEN)
        .map(str::to_string)
}

/// Create the profile on first sight and resolve the caller's role.
async fn resolve_caller(
    state: &DaemonState,
    claims: Claims,
    addr: SocketAddr,
    headers: &HeaderMap,
) -> Result<Caller, RpcError> {
    let mut db = state.db.lock().await;
    ensure_profile(
        &mut db,
        &claims.sub,
        state.config.economy.signup_bonus,
        unix_now(),
    )?;
    let role = roles::get(&db, &claims.sub)?;
    Ok(Caller {
        user_id: claims.sub,
        role,
        ip_address: addr.ip().to_string(),
        device_fingerprint: device_fingerprint(headers),
    })
}

/// `POST /rpc`
pub async fn rpc_handler(
    State(state): State<Arc<DaemonState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let claims = match state.tokens.verify_headers(&headers) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(%addr, error = %e, "rejected RPC request");
            return rpc_failure(StatusCode::UNAUTHORIZED, RpcError::unauthorized(&e.to_string()));
        }
    };

    let request: RpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!(%addr, error = %e, "unparsable RPC body");
            return rpc_failure(StatusCode::BAD_REQUEST, RpcError::parse_error());
        }
    };

    let caller = match resolve_caller(&state, claims, addr, &headers).await {
        Ok(caller) => caller,
        Err(err) => return Json(RpcResponse::error(request.id, err)).into_response(),
    };

    Json(dispatch_request(&state, &caller, request).await).into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub token: Option<String>,
    /// Comma-separated categories; see [`EventFilter`].
    pub categories: Option<String>,
}

/// `GET /events`
pub async fn events_handler(
    State(state): State<Arc<DaemonState>>,
    Query(query): Query<EventsQuery>,
    headers: HeaderMap,
) -> Response {
    let verified = match query.token.as_deref() {
        Some(token) => state.tokens.verify(token),
        None => state.tokens.verify_headers(&headers),
    };
    let claims = match verified {
        Ok(claims) => claims,
        Err(e) => {
            return rpc_failure(StatusCode::UNAUTHORIZED, RpcError::unauthorized(&e.to_string()))
        }
    };

    let is_admin = {
        let db = state.db.lock().await;
        match roles::get(&db, &claims.sub) {
            Ok(role) => role.is_admin(),
            Err(e) => {
                return rpc_failure(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    RpcError::internal_error(&e.to_string()),
                )
            }
        }
    };

    let filter = EventFilter::new(claims.sub, query.categories.as_deref()).with_admin(is_admin);
    info!(user_id = %filter.user_id, categories = ?filter.categories, "event stream opened");

    let events = filtered_events(
        state.event_bus.subscribe(),
        state.shutdown_tx.subscribe(),
        filter,
    )
    .filter_map(|event| {
        let sse = match SseEvent::default().event(event.event_type.name()).json_data(&event) {
            Ok(sse) => Some(Ok::<_, Infallible>(sse)),
            Err(e) => {
                warn!(error = %e, "failed to encode event");
                None
            }
        };
        futures_util::future::ready(sse)
    });

    Sse::new(events)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(KEEP_ALIVE_SECS)))
        .into_response()
}

/// Events for one subscriber, ending when the daemon shuts down.
fn filtered_events(
    events: broadcast::Receiver<Event>,
    mut shutdown: broadcast::Receiver<()>,
    filter: EventFilter,
) -> impl Stream<Item = Event> + Send {
    BroadcastStream::new(events)
        .filter_map(move |item| {
            let event = match item {
                Ok(event) if filter.matches(&event) => Some(event),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged");
                    None
                }
            };
            futures_util::future::ready(event)
        })
        .take_until(async move {
            // A closed channel also ends the stream.
            let _ = shutdown.recv().await;
        })
}

/// `GET /health`
pub async fn health_handler(State(state): State<Arc<DaemonState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "events_emitted": state.event_bus.sequence(),
    }))
}
