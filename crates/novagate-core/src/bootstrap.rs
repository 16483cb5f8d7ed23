//! Startup wiring: turns a loaded [`ConfigSnapshot`] plus a live database
//! connection into a fully-assembled [`AppState`] and [`Dispatcher`].
//!
//! CLI/env parsing, DSN resolution, and the provider/alias/key config
//! source itself are the binary's job (`apps/novagate`), not this crate's.
//! This only assembles runtime components from inputs it is handed.

use std::sync::Arc;

use anyhow::Context;

use novagate_common::{Clock, Settings, SystemClock};
use novagate_provider_core::{CooldownManager, CredentialPool, EventHub, ProviderRegistry, QuotaMirror, TerminalEventSink};
use novagate_router::PerformanceMirror;
use novagate_storage::{DatabaseConnection, Journal};

use crate::dispatch::Dispatcher;
use crate::state::{AppState, ConfigSnapshot, ConfigSource};
use crate::upstream_client::{ReqwestUpstreamClient, UpstreamClient, UpstreamClientConfig};

pub struct Bootstrap {
    pub state: Arc<AppState>,
    pub dispatcher: Dispatcher,
    pub events: EventHub,
    pub journal: Arc<Journal>,
}

/// Assembles every long-lived component and the first [`ConfigSnapshot`].
/// `proxy` is the optional outbound proxy every upstream request should be
/// sent through; `db` is an already-connected, already-schema-synced
/// database handle for the Journal's background writer.
pub async fn bootstrap(
    settings: &Settings,
    config_source: &dyn ConfigSource,
    db: DatabaseConnection,
    proxy: Option<String>,
) -> anyhow::Result<Bootstrap> {
    let mut snapshot: ConfigSnapshot = config_source.load().context("load configuration")?;
    if snapshot.max_attempts == 0 {
        snapshot.max_attempts = settings.max_attempts;
    }

    let events = EventHub::new(1024);
    events.add_sink(Arc::new(TerminalEventSink::new())).await;

    let mut registry = ProviderRegistry::new();
    for provider in novagate_provider_impl::builtin_providers() {
        registry.register(provider);
    }
    let registry = Arc::new(registry);

    let journal = Journal::new();
    journal.spawn_writer(db);

    let cooldown = CooldownManager::new();
    let performance = Arc::new(PerformanceMirror::new());
    let quota = QuotaMirror::new();
    let credentials = Arc::new(CredentialPool::new(events.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let http: Arc<dyn UpstreamClient> = Arc::new(ReqwestUpstreamClient::new(UpstreamClientConfig {
        proxy,
        ..UpstreamClientConfig::default()
    }));

    let state = Arc::new(
        AppState::new(
            snapshot,
            cooldown,
            performance,
            quota,
            credentials,
            events.clone(),
            registry,
            journal.clone(),
            clock,
            http,
        )
        .context("build app state")?,
    );

    let dispatcher = Dispatcher::new(state.clone());

    Ok(Bootstrap {
        state,
        dispatcher,
        events,
        journal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyConfigSource;

    impl ConfigSource for EmptyConfigSource {
        fn load(&self) -> Result<ConfigSnapshot, crate::state::ConfigError> {
            Ok(ConfigSnapshot::default())
        }
    }

    #[tokio::test]
    async fn bootstrap_assembles_state_with_settings_max_attempts() {
        let db = novagate_storage::connect_shared("sqlite::memory:").await.unwrap();
        novagate_storage::sync_schema(&db).await.unwrap();

        let settings = Settings {
            max_attempts: 4,
            ..Settings::default()
        };
        let boot = bootstrap(&settings, &EmptyConfigSource, db, None).await.unwrap();

        assert_eq!(boot.state.max_attempts(), 4);
    }

    struct ZeroAttemptsConfigSource;

    impl ConfigSource for ZeroAttemptsConfigSource {
        fn load(&self) -> Result<ConfigSnapshot, crate::state::ConfigError> {
            Ok(ConfigSnapshot {
                max_attempts: 0,
                ..ConfigSnapshot::default()
            })
        }
    }

    #[tokio::test]
    async fn a_config_with_no_max_attempts_falls_back_to_settings() {
        let db = novagate_storage::connect_shared("sqlite::memory:").await.unwrap();
        novagate_storage::sync_schema(&db).await.unwrap();

        let settings = Settings {
            max_attempts: 2,
            ..Settings::default()
        };
        let boot = bootstrap(&settings, &ZeroAttemptsConfigSource, db, None).await.unwrap();

        assert_eq!(boot.state.max_attempts(), 2);
    }
}
