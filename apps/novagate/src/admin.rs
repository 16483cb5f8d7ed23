//! The read-only operational surface: an SSE feed of downstream/upstream/
//! operational events, the active cooldown list, and the quota mirror.
//!
//! Config is a file this binary reads at startup, not something a client
//! edits over HTTP, so there is no mutation path here — only the
//! observability endpoints, unauthenticated.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::routing::get;
use futures_util::Stream;
use futures_util::StreamExt;
use serde::Serialize;
use tokio_stream::wrappers::BroadcastStream;

use novagate_core::state::AppState;

pub(crate) fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/admin/health", get(health))
        .route("/admin/stats", get(stats))
        .route("/admin/cooldowns", get(cooldowns))
        .route("/admin/quota", get(quota))
        .route("/admin/events", get(events))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Serialize)]
struct Stats {
    max_attempts: usize,
    active_cooldowns: usize,
}

async fn stats(State(state): State<Arc<AppState>>) -> Json<Stats> {
    let active_cooldowns = state.cooldown.active().await.len();
    Json(Stats {
        max_attempts: state.max_attempts(),
        active_cooldowns,
    })
}

#[derive(Serialize)]
struct CooldownRow {
    key: String,
    reason: String,
    remaining_secs: u64,
}

async fn cooldowns(State(state): State<Arc<AppState>>) -> Json<Vec<CooldownRow>> {
    let now = std::time::SystemTime::now();
    let rows = state
        .cooldown
        .active()
        .await
        .into_iter()
        .map(|(key, entry)| CooldownRow {
            key: format!("{key:?}"),
            reason: entry.reason,
            remaining_secs: entry.end.duration_since(now).unwrap_or_default().as_secs(),
        })
        .collect();
    Json(rows)
}

async fn quota(State(state): State<Arc<AppState>>) -> Json<Vec<novagate_provider_core::QuotaSnapshot>> {
    Json(state.quota.all().await)
}

async fn events(State(state): State<Arc<AppState>>) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let stream = BroadcastStream::new(state.events.subscribe()).filter_map(|event| async move {
        let event = event.ok()?;
        let payload = serde_json::to_string(&event).ok()?;
        Some(Ok(SseEvent::default().data(payload)))
    });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
