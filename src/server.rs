use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::error::AppError;
use crate::hub::BroadcastHub;
use crate::model::status::ConnectionStatus;
use crate::model::tick::PriceTick;
use crate::status::StatusTracker;
use crate::store::HistoryStore;

#[derive(Clone)]
pub struct AppContext {
    pub status: Arc<StatusTracker>,
    pub hub: Arc<BroadcastHub>,
    pub store: HistoryStore,
    pub channel: String,
    pub initial_price: f64,
}

pub fn router(ctx: AppContext, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/history", get(history))
        .route("/ws", get(ws_handler))
        .layer(cors_layer(allowed_origins))
        .with_state(ctx)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        tracing::warn!("ALLOWED_ORIGINS not set, allowing any origin");
        AllowOrigin::any()
    } else {
        let parsed: Vec<axum::http::HeaderValue> =
            origins.iter().filter_map(|o| o.parse().ok()).collect();
        if parsed.is_empty() {
            tracing::warn!("ALLOWED_ORIGINS contains no valid origins, allowing any");
            AllowOrigin::any()
        } else {
            tracing::info!(count = parsed.len(), "CORS restricted to configured origins");
            AllowOrigin::list(parsed)
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([axum::http::Method::GET])
        .allow_headers([axum::http::header::CONTENT_TYPE])
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    #[serde(flatten)]
    status: ConnectionStatus,
    channel: String,
    current_price: f64,
}

async fn status(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    let snapshot = ctx.status.snapshot();
    let current_price = ctx
        .hub
        .latest_tick()
        .map(|tick| tick.price)
        .unwrap_or(ctx.initial_price);
    Json(StatusResponse {
        status: snapshot,
        channel: ctx.channel.clone(),
        current_price,
    })
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    range: Option<String>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

async fn history(
    State(ctx): State<AppContext>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<PriceTick>>, AppError> {
    let (from, to) = resolve_range(&query)?;
    let ticks = ctx.store.query_range(from, to)?;
    Ok(Json(ticks))
}

/// Relative range keys accepted by `/history`.
fn range_duration(key: &str) -> Option<ChronoDuration> {
    let days = match key {
        "today" => 1,
        "3days" => 3,
        "7days" => 7,
        "30days" => 30,
        "3months" => 90,
        "6months" => 180,
        "1year" => 365,
        _ => return None,
    };
    Some(ChronoDuration::days(days))
}

fn resolve_range(query: &HistoryQuery) -> Result<(DateTime<Utc>, DateTime<Utc>), AppError> {
    match (query.from, query.to) {
        (Some(from), Some(to)) => {
            if from > to {
                return Err(AppError::BadRequest("'from' must not be after 'to'".into()));
            }
            Ok((from, to))
        }
        (Some(from), None) => Ok((from, Utc::now())),
        (None, Some(_)) => Err(AppError::BadRequest("'to' requires 'from'".into())),
        (None, None) => {
            let key = query.range.as_deref().unwrap_or("today");
            let duration = range_duration(key)
                .ok_or_else(|| AppError::BadRequest(format!("invalid range '{}'", key)))?;
            let now = Utc::now();
            Ok((now - duration, now))
        }
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(ctx): State<AppContext>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, ctx))
}

async fn handle_socket(socket: WebSocket, ctx: AppContext) {
    let snapshot = ctx.status.snapshot();
    let (id, mut events) = ctx.hub.subscribe(&snapshot);
    let (mut sender, mut receiver) = socket.split();

    let mut forward_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to serialize event");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Viewers are read-only; inbound frames are drained and discarded.
    let mut receive_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut forward_task => receive_task.abort(),
        _ = &mut receive_task => forward_task.abort(),
    }
    ctx.hub.unsubscribe(id);
}
