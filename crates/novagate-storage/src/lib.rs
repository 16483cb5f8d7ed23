//! The append-only usage/error/debug journal: `novagate-core`'s only
//! persistent-store dependency. Provider/alias/client-key configuration is
//! out of scope here (it is loaded by an external `ConfigSource`
//! collaborator, per the gateway's data-model split) — this crate owns
//! exactly the three Journal record kinds and their retention.

pub mod db;
pub mod entities;
pub mod journal;
pub mod retention;

pub use db::connect_shared;
pub use journal::{DebugTrace, ErrorRecord, Journal, UsageRecord};
pub use retention::{RetentionPolicy, compact_once, spawn_compactor};
pub use sea_orm::DatabaseConnection;

use sea_orm::{ConnectionTrait, Schema};

/// Runs `sea-orm`'s entity-first schema sync for the three journal tables.
pub async fn sync_schema(db: &DatabaseConnection) -> Result<(), sea_orm::DbErr> {
    Schema::new(db.get_database_backend())
        .builder()
        .register(entities::UsageRecords)
        .register(entities::ErrorRecords)
        .register(entities::DebugTraces)
        .sync(db)
        .await
}
