//! Periodic compaction: deletes journal rows older than their stream's
//! retention window. Retention is time-based and scoped per kind, so usage
//! (the accounting source of truth) can be kept far longer than debug
//! traces without the caller having to reason about row counts.

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use time::{Duration, OffsetDateTime};
use tokio::task::JoinHandle;
use tokio::time::{self as tokio_time, MissedTickBehavior};

use crate::entities::{debug_traces, error_records, usage_records};

#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub usage: Duration,
    pub errors: Duration,
    pub debug: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            usage: Duration::days(90),
            errors: Duration::days(30),
            debug: Duration::days(2),
        }
    }
}

const SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(3600);

pub fn spawn_compactor(db: DatabaseConnection, policy: RetentionPolicy) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio_time::interval(SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = compact_once(&db, policy).await {
                tracing::warn!(error = %err, "journal retention sweep failed");
            }
        }
    })
}

pub async fn compact_once(db: &DatabaseConnection, policy: RetentionPolicy) -> Result<(), sea_orm::DbErr> {
    let now = OffsetDateTime::now_utc();
    usage_records::Entity::delete_many()
        .filter(usage_records::Column::Ts.lt(now - policy.usage))
        .exec(db)
        .await?;
    error_records::Entity::delete_many()
        .filter(error_records::Column::Ts.lt(now - policy.errors))
        .exec(db)
        .await?;
    debug_traces::Entity::delete_many()
        .filter(debug_traces::Column::Ts.lt(now - policy.debug))
        .exec(db)
        .await?;
    Ok(())
}
