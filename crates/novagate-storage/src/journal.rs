//! Append-only usage/error/debug journal.
//!
//! Grounded on a bounded mpsc channel drained by a background task (see
//! the removed `gproxy-storage/src/bus.rs`); this keeps that bounded-
//! channel-plus-background-writer structure but generalizes a single queue
//! into three kinds sharing one eviction budget, since the overflow policy ("drop
//! debug first, then old errors, never usage") only makes sense when the
//! kinds are evicted against each other rather than independently capped.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use sea_orm::{ActiveValue, DatabaseConnection, EntityTrait};
use time::OffsetDateTime;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{self as tokio_time, Duration, MissedTickBehavior};

use crate::entities::{debug_traces, error_records, usage_records};

#[derive(Debug, Clone)]
pub struct UsageRecord {
    pub request_id: String,
    pub ts: OffsetDateTime,
    pub client_key_name: String,
    pub alias_requested: String,
    pub alias_used: String,
    pub provider_id: String,
    pub upstream_model: String,
    pub api_family_in: &'static str,
    pub api_family_out: &'static str,
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub cached_tokens: Option<u64>,
    pub cache_write_tokens: Option<u64>,
    pub cost_usd: Option<f64>,
    pub ttft_ms: Option<u64>,
    pub total_ms: u64,
    pub tokens_per_sec: Option<f64>,
    pub streamed: bool,
    pub ok: bool,
}

#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub request_id: String,
    pub ts: OffsetDateTime,
    pub kind: String,
    pub provider_id: Option<String>,
    pub upstream_model: Option<String>,
    pub status_code: Option<i32>,
    pub message: String,
    pub stack: Option<String>,
    pub headers: Option<serde_json::Value>,
    pub provider_response: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct DebugTrace {
    pub request_id: String,
    pub ts: OffsetDateTime,
    pub raw_request: serde_json::Value,
    pub transformed_request: Option<serde_json::Value>,
    pub raw_response: Option<serde_json::Value>,
    pub transformed_response: Option<serde_json::Value>,
    pub snapshots: Vec<serde_json::Value>,
}

/// How many buffered-but-unwritten records the journal tolerates before its
/// eviction policy kicks in. This bounds memory, not throughput: the
/// background writer drains far faster than any realistic request rate.
const DEFAULT_MAX_BUFFERED: usize = 10_000;
const FLUSH_INTERVAL: Duration = Duration::from_millis(250);
const FLUSH_BATCH: usize = 500;

struct Queues {
    usage: VecDeque<UsageRecord>,
    errors: VecDeque<ErrorRecord>,
    debug: VecDeque<DebugTrace>,
}

impl Queues {
    fn len(&self) -> usize {
        self.usage.len() + self.errors.len() + self.debug.len()
    }

    /// Makes room for one more record by evicting the least-valuable kind
    /// first: debug traces, then the oldest error record. Usage is never
    /// touched by this path, per the journal's overflow policy.
    fn make_room(&mut self, max_buffered: usize) {
        while self.len() >= max_buffered {
            if self.debug.pop_front().is_some() {
                continue;
            }
            if self.errors.pop_front().is_some() {
                continue;
            }
            break;
        }
    }
}

/// Append-only usage/error/debug journal. The hot path hands records to
/// in-memory queues and returns immediately; a background task batches
/// inserts. Usage records are the accounting source of truth and are never
/// dropped; debug and (as a last resort) error records are evicted under
/// sustained backpressure.
pub struct Journal {
    queues: Mutex<Queues>,
    notify: Arc<Notify>,
    max_buffered: usize,
}

impl Journal {
    pub fn new() -> Arc<Self> {
        Self::with_capacity(DEFAULT_MAX_BUFFERED)
    }

    pub fn with_capacity(max_buffered: usize) -> Arc<Self> {
        Arc::new(Self {
            queues: Mutex::new(Queues {
                usage: VecDeque::new(),
                errors: VecDeque::new(),
                debug: VecDeque::new(),
            }),
            notify: Arc::new(Notify::new()),
            max_buffered,
        })
    }

    pub fn record_usage(&self, record: UsageRecord) {
        let mut queues = self.queues.lock().unwrap();
        queues.make_room(self.max_buffered);
        queues.usage.push_back(record);
        self.notify.notify_one();
    }

    pub fn record_error(&self, record: ErrorRecord) {
        let mut queues = self.queues.lock().unwrap();
        if queues.len() >= self.max_buffered && queues.debug.pop_front().is_none() {
            // No debug traces left to evict; an error record is the next
            // least-valuable kind, so drop the oldest one to make room.
            queues.errors.pop_front();
        }
        queues.errors.push_back(record);
        self.notify.notify_one();
    }

    pub fn record_debug(&self, trace: DebugTrace) {
        let mut queues = self.queues.lock().unwrap();
        if queues.len() >= self.max_buffered {
            queues.debug.pop_front();
        }
        queues.debug.push_back(trace);
        self.notify.notify_one();
    }

    fn drain_batch(&self) -> (Vec<UsageRecord>, Vec<ErrorRecord>, Vec<DebugTrace>) {
        let mut queues = self.queues.lock().unwrap();
        let usage = drain_up_to(&mut queues.usage, FLUSH_BATCH);
        let errors = drain_up_to(&mut queues.errors, FLUSH_BATCH);
        let debug = drain_up_to(&mut queues.debug, FLUSH_BATCH);
        (usage, errors, debug)
    }

    /// Spawns the background flusher. One per process; holding the returned
    /// handle keeps it alive for the caller to `abort` on shutdown.
    pub fn spawn_writer(self: &Arc<Self>, db: DatabaseConnection) -> JoinHandle<()> {
        let journal = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio_time::interval(FLUSH_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let (usage, errors, debug) = journal.drain_batch();
                if usage.is_empty() && errors.is_empty() && debug.is_empty() {
                    continue;
                }
                if let Err(err) = flush_usage(&db, usage).await {
                    tracing::warn!(error = %err, "journal usage flush failed");
                }
                if let Err(err) = flush_errors(&db, errors).await {
                    tracing::warn!(error = %err, "journal error flush failed");
                }
                if let Err(err) = flush_debug(&db, debug).await {
                    tracing::warn!(error = %err, "journal debug flush failed");
                }
            }
        })
    }
}

fn drain_up_to<T>(buf: &mut VecDeque<T>, n: usize) -> Vec<T> {
    let take = buf.len().min(n);
    buf.drain(..take).collect()
}

async fn flush_usage(db: &DatabaseConnection, records: Vec<UsageRecord>) -> Result<(), sea_orm::DbErr> {
    if records.is_empty() {
        return Ok(());
    }
    let models = records.into_iter().map(|r| usage_records::ActiveModel {
        id: ActiveValue::NotSet,
        request_id: ActiveValue::Set(r.request_id),
        ts: ActiveValue::Set(r.ts),
        client_key_name: ActiveValue::Set(r.client_key_name),
        alias_requested: ActiveValue::Set(r.alias_requested),
        alias_used: ActiveValue::Set(r.alias_used),
        provider_id: ActiveValue::Set(r.provider_id),
        upstream_model: ActiveValue::Set(r.upstream_model),
        api_family_in: ActiveValue::Set(r.api_family_in.to_string()),
        api_family_out: ActiveValue::Set(r.api_family_out.to_string()),
        prompt_tokens: ActiveValue::Set(r.prompt_tokens.map(|v| v as i64)),
        completion_tokens: ActiveValue::Set(r.completion_tokens.map(|v| v as i64)),
        cached_tokens: ActiveValue::Set(r.cached_tokens.map(|v| v as i64)),
        cache_write_tokens: ActiveValue::Set(r.cache_write_tokens.map(|v| v as i64)),
        cost_usd: ActiveValue::Set(r.cost_usd),
        ttft_ms: ActiveValue::Set(r.ttft_ms.map(|v| v as i64)),
        total_ms: ActiveValue::Set(r.total_ms as i64),
        tokens_per_sec: ActiveValue::Set(r.tokens_per_sec),
        streamed: ActiveValue::Set(r.streamed),
        ok: ActiveValue::Set(r.ok),
    });
    usage_records::Entity::insert_many(models).exec(db).await?;
    Ok(())
}

async fn flush_errors(db: &DatabaseConnection, records: Vec<ErrorRecord>) -> Result<(), sea_orm::DbErr> {
    if records.is_empty() {
        return Ok(());
    }
    let models = records.into_iter().map(|r| error_records::ActiveModel {
        id: ActiveValue::NotSet,
        request_id: ActiveValue::Set(r.request_id),
        ts: ActiveValue::Set(r.ts),
        kind: ActiveValue::Set(r.kind),
        provider_id: ActiveValue::Set(r.provider_id),
        upstream_model: ActiveValue::Set(r.upstream_model),
        status_code: ActiveValue::Set(r.status_code),
        message: ActiveValue::Set(r.message),
        stack: ActiveValue::Set(r.stack),
        headers_json: ActiveValue::Set(r.headers),
        provider_response_json: ActiveValue::Set(r.provider_response),
    });
    error_records::Entity::insert_many(models).exec(db).await?;
    Ok(())
}

async fn flush_debug(db: &DatabaseConnection, traces: Vec<DebugTrace>) -> Result<(), sea_orm::DbErr> {
    if traces.is_empty() {
        return Ok(());
    }
    let models = traces.into_iter().map(|t| debug_traces::ActiveModel {
        id: ActiveValue::NotSet,
        request_id: ActiveValue::Set(t.request_id),
        ts: ActiveValue::Set(t.ts),
        raw_request: ActiveValue::Set(t.raw_request),
        transformed_request: ActiveValue::Set(t.transformed_request),
        raw_response: ActiveValue::Set(t.raw_response),
        transformed_response: ActiveValue::Set(t.transformed_response),
        snapshots: ActiveValue::Set(serde_json::Value::Array(t.snapshots)),
    });
    debug_traces::Entity::insert_many(models).exec(db).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(id: &str) -> UsageRecord {
        UsageRecord {
            request_id: id.to_string(),
            ts: OffsetDateTime::now_utc(),
            client_key_name: "k".to_string(),
            alias_requested: "fast".to_string(),
            alias_used: "fast".to_string(),
            provider_id: "openai".to_string(),
            upstream_model: "gpt-4o-mini".to_string(),
            api_family_in: "chat",
            api_family_out: "chat",
            prompt_tokens: Some(10),
            completion_tokens: Some(5),
            cached_tokens: None,
            cache_write_tokens: None,
            cost_usd: Some(0.01),
            ttft_ms: Some(120),
            total_ms: 400,
            tokens_per_sec: Some(12.5),
            streamed: false,
            ok: true,
        }
    }

    fn debug(id: &str) -> DebugTrace {
        DebugTrace {
            request_id: id.to_string(),
            ts: OffsetDateTime::now_utc(),
            raw_request: serde_json::json!({}),
            transformed_request: None,
            raw_response: None,
            transformed_response: None,
            snapshots: Vec::new(),
        }
    }

    #[test]
    fn usage_is_never_evicted_by_debug_pressure() {
        let journal = Journal::with_capacity(3);
        journal.record_usage(usage("u1"));
        journal.record_debug(debug("d1"));
        journal.record_debug(debug("d2"));
        // Buffer is now full (3); one more debug trace should evict the
        // oldest debug entry, not the usage record.
        journal.record_debug(debug("d3"));
        let queues = journal.queues.lock().unwrap();
        assert_eq!(queues.usage.len(), 1);
        assert_eq!(queues.debug.len(), 2);
    }

    #[test]
    fn drain_batch_respects_cap() {
        let journal = Journal::with_capacity(DEFAULT_MAX_BUFFERED);
        for i in 0..(FLUSH_BATCH + 10) {
            journal.record_usage(usage(&i.to_string()));
        }
        let (usage_batch, _, _) = journal.drain_batch();
        assert_eq!(usage_batch.len(), FLUSH_BATCH);
    }
}
