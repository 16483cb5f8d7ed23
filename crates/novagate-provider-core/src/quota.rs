//! Quota mirror: a read-only cache of whatever quota/budget figures a provider
//! exposes about itself (e.g. an OAuth subscription's remaining allowance).
//!
//! Modelled after the Cooldown Manager's lazy-refresh shape (`[[cooldown]]`)
//! since both are "read a small in-memory snapshot that a background task
//! refreshes" abstractions. The gateway never enforces quota — it only
//! surfaces what it last observed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    pub provider_id: String,
    pub observed_at: SystemTime,
    /// Free-form, provider-specific figures (e.g. `"five_hour_used_pct"`).
    pub figures: HashMap<String, f64>,
}

#[derive(Clone, Default)]
pub struct QuotaMirror {
    snapshots: Arc<RwLock<HashMap<String, QuotaSnapshot>>>,
}

impl QuotaMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn update(&self, snapshot: QuotaSnapshot) {
        self.snapshots
            .write()
            .await
            .insert(snapshot.provider_id.clone(), snapshot);
    }

    pub async fn get(&self, provider_id: &str) -> Option<QuotaSnapshot> {
        self.snapshots.read().await.get(provider_id).cloned()
    }

    pub async fn all(&self) -> Vec<QuotaSnapshot> {
        let mut rows: Vec<_> = self.snapshots.read().await.values().cloned().collect();
        rows.sort_by(|a, b| a.provider_id.cmp(&b.provider_id));
        rows
    }
}
