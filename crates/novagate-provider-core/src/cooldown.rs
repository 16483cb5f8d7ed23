//! Cooldown Manager: two maps (provider-wide, and `(provider, model)`-scoped)
//! with lazy expiry on read.
//!
//! Grounded on `disallow.rs`'s `DisallowScope`/`DisallowLevel`/
//! `DisallowEntry::is_active` shape (generalized from a per-credential scope
//! to a per-provider one) and on `credential/pool.rs`'s background reap loop,
//! simplified here to the lazy-on-read model the cooldown contract asks for
//! rather than a `BinaryHeap` + `Notify` recovery task — a key is either
//! still down or it isn't, checked at `isDown`/`remaining` time, so no
//! background task is needed to keep the maps correct.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CooldownKey {
    Provider(String),
    Model(String, String),
}

impl CooldownKey {
    pub fn provider(&self) -> &str {
        match self {
            CooldownKey::Provider(p) => p,
            CooldownKey::Model(p, _) => p,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooldownEntry {
    pub start: SystemTime,
    pub end: SystemTime,
    pub reason: String,
}

impl CooldownEntry {
    fn is_active(&self, now: SystemTime) -> bool {
        self.end > now
    }
}

/// The upstream signal that triggered a terminal failure, mapped to a
/// cooldown duration and scope per the entry-rule table.
#[derive(Debug, Clone)]
pub enum UpstreamSignal {
    RateLimited { retry_after: Option<Duration> },
    Unauthorized,
    ServerError,
    ModelUnavailable,
}

const RATE_LIMIT_FALLBACK: Duration = Duration::from_secs(30);
const RATE_LIMIT_BASE: Duration = Duration::from_secs(60);
const RATE_LIMIT_CAP: Duration = Duration::from_secs(30 * 60);
const AUTH_COOLDOWN: Duration = Duration::from_secs(15 * 60);
const SERVER_ERROR_BASE: Duration = Duration::from_secs(30);
const SERVER_ERROR_CAP: Duration = Duration::from_secs(5 * 60);
const MODEL_UNAVAILABLE_COOLDOWN: Duration = Duration::from_secs(10 * 60);
/// A repeat counts toward doubling only if it lands within this window of the
/// previous cooldown's start.
const REPEAT_WINDOW: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Default)]
struct Backoff {
    streak: u32,
    last_start: Option<SystemTime>,
}

#[derive(Default)]
pub struct CooldownManager {
    entries: RwLock<HashMap<CooldownKey, CooldownEntry>>,
    backoff: RwLock<HashMap<CooldownKey, Backoff>>,
}

impl CooldownManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn put(&self, key: CooldownKey, duration: Duration, reason: impl Into<String>) {
        let now = SystemTime::now();
        let entry = CooldownEntry {
            start: now,
            end: now + duration,
            reason: reason.into(),
        };
        self.entries.write().await.insert(key, entry);
    }

    pub async fn is_down(&self, key: &CooldownKey) -> bool {
        let now = SystemTime::now();
        let entries = self.entries.read().await;
        entries.get(key).is_some_and(|e| e.is_active(now))
    }

    /// A provider is fully down only if its provider-wide entry is active;
    /// model-scoped cooldowns apply only to that `(provider, model)` pair.
    pub async fn is_provider_down(&self, provider_id: &str) -> bool {
        self.is_down(&CooldownKey::Provider(provider_id.to_string()))
            .await
    }

    pub async fn is_model_down(&self, provider_id: &str, model: &str) -> bool {
        if self.is_provider_down(provider_id).await {
            return true;
        }
        self.is_down(&CooldownKey::Model(provider_id.to_string(), model.to_string()))
            .await
    }

    pub async fn remaining(&self, key: &CooldownKey) -> Duration {
        let now = SystemTime::now();
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(e) if e.is_active(now) => e.end.duration_since(now).unwrap_or_default(),
            _ => Duration::ZERO,
        }
    }

    pub async fn clear(&self, key: &CooldownKey) {
        self.entries.write().await.remove(key);
        self.backoff.write().await.remove(key);
    }

    /// All currently-active cooldowns, reaping expired entries as a side
    /// effect (the lazy-reap-on-read the cooldown contract asks for).
    pub async fn active(&self) -> Vec<(CooldownKey, CooldownEntry)> {
        let now = SystemTime::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, e| e.is_active(now));
        let mut rows: Vec<_> = entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        rows.sort_by(|a, b| format!("{:?}", a.0).cmp(&format!("{:?}", b.0)));
        rows
    }

    /// Sweep expired entries without returning them; intended for a periodic
    /// background task rather than the hot read path.
    pub async fn tick(&self) {
        let now = SystemTime::now();
        self.entries.write().await.retain(|_, e| e.is_active(now));
    }

    /// Reset the backoff streak for a key after a successful call, per the
    /// "Success -> reset backoff counters" rule. Clears both the
    /// provider-wide streak (rate-limit/auth doubling) and the
    /// `(provider, model)` streak (5xx doubling) for the model that just
    /// succeeded.
    pub async fn record_success(&self, provider_id: &str, model: &str) {
        let mut backoff = self.backoff.write().await;
        backoff.remove(&CooldownKey::Provider(provider_id.to_string()));
        backoff.remove(&CooldownKey::Model(provider_id.to_string(), model.to_string()));
    }

    /// Apply the upstream-signal -> cooldown-duration rule table and enter
    /// the resulting cooldown, doubling repeat rate-limit/5xx cooldowns that
    /// land within the repeat window.
    pub async fn record_failure(&self, provider_id: &str, model: Option<&str>, signal: UpstreamSignal) {
        let now = SystemTime::now();
        match signal {
            UpstreamSignal::RateLimited { retry_after } => {
                let key = CooldownKey::Provider(provider_id.to_string());
                let duration = match retry_after {
                    Some(d) => d.max(RATE_LIMIT_FALLBACK),
                    None => self.doubled(&key, now, RATE_LIMIT_BASE, RATE_LIMIT_CAP).await,
                };
                self.put(key, duration, "rate_limited").await;
            }
            UpstreamSignal::Unauthorized => {
                self.put(
                    CooldownKey::Provider(provider_id.to_string()),
                    AUTH_COOLDOWN,
                    "auth",
                )
                .await;
            }
            UpstreamSignal::ServerError => {
                let key = CooldownKey::Model(
                    provider_id.to_string(),
                    model.unwrap_or_default().to_string(),
                );
                let duration = self.doubled(&key, now, SERVER_ERROR_BASE, SERVER_ERROR_CAP).await;
                self.put(key, duration, "upstream_5xx").await;
            }
            UpstreamSignal::ModelUnavailable => {
                self.put(
                    CooldownKey::Model(
                        provider_id.to_string(),
                        model.unwrap_or_default().to_string(),
                    ),
                    MODEL_UNAVAILABLE_COOLDOWN,
                    "model_unavailable",
                )
                .await;
            }
        }
    }

    async fn doubled(&self, key: &CooldownKey, now: SystemTime, base: Duration, cap: Duration) -> Duration {
        let mut backoff = self.backoff.write().await;
        let entry = backoff.entry(key.clone()).or_default();
        let within_window = entry
            .last_start
            .is_some_and(|last| now.duration_since(last).unwrap_or(Duration::MAX) < REPEAT_WINDOW);
        if within_window {
            entry.streak += 1;
        } else {
            entry.streak = 0;
        }
        entry.last_start = Some(now);
        let multiplier = 1u32 << entry.streak.min(16);
        (base * multiplier).min(cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn provider_cooldown_expires_lazily() {
        let mgr = CooldownManager::new();
        mgr.put(
            CooldownKey::Provider("p1".into()),
            Duration::from_millis(10),
            "test",
        )
        .await;
        assert!(mgr.is_provider_down("p1").await);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!mgr.is_provider_down("p1").await);
    }

    #[tokio::test]
    async fn model_scoped_cooldown_does_not_affect_other_models() {
        let mgr = CooldownManager::new();
        mgr.record_failure("p1", Some("m1"), UpstreamSignal::ServerError)
            .await;
        assert!(mgr.is_model_down("p1", "m1").await);
        assert!(!mgr.is_model_down("p1", "m2").await);
    }

    #[tokio::test]
    async fn repeat_rate_limits_double_up_to_cap() {
        let mgr = CooldownManager::new();
        mgr.record_failure("p1", None, UpstreamSignal::RateLimited { retry_after: None })
            .await;
        let first = mgr.remaining(&CooldownKey::Provider("p1".into())).await;
        mgr.record_failure("p1", None, UpstreamSignal::RateLimited { retry_after: None })
            .await;
        let second = mgr.remaining(&CooldownKey::Provider("p1".into())).await;
        assert!(second >= first);
    }

    #[tokio::test]
    async fn provider_wide_cooldown_implies_model_down() {
        let mgr = CooldownManager::new();
        mgr.record_failure("p1", None, UpstreamSignal::Unauthorized)
            .await;
        assert!(mgr.is_model_down("p1", "anything").await);
    }

    #[tokio::test]
    async fn record_success_resets_the_model_scoped_5xx_streak() {
        let mgr = CooldownManager::new();
        // Two 5xx failures in quick succession double the second cooldown
        // past the base duration.
        mgr.record_failure("p1", Some("m1"), UpstreamSignal::ServerError)
            .await;
        mgr.record_failure("p1", Some("m1"), UpstreamSignal::ServerError)
            .await;
        let doubled = mgr.remaining(&CooldownKey::Model("p1".into(), "m1".into())).await;
        assert!(doubled > SERVER_ERROR_BASE);

        mgr.record_success("p1", "m1").await;

        mgr.record_failure("p1", Some("m1"), UpstreamSignal::ServerError)
            .await;
        let after_reset = mgr.remaining(&CooldownKey::Model("p1".into(), "m1".into())).await;
        assert!(
            after_reset <= SERVER_ERROR_BASE,
            "streak should restart at the base duration after a success, got {after_reset:?}"
        );
    }
}
