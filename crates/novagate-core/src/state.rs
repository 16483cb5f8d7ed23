//! Config Snapshot + `AppState`: the wholesale-swappable configuration the
//! rest of the core reads, plus the handles to every other component the
//! Dispatcher and handler need.
//!
//! There is no admin-mutation write surface in this crate (that is an
//! external collaborator's job, per the core/admin split), so `AppState`
//! holds one `ArcSwap<RouterState>` rather than several independently-
//! mutable maps plus a `Storage` handle — readers capture the pointer at
//! task start and a reload swaps it wholesale.

use std::sync::Arc;

use arc_swap::ArcSwap;

use novagate_common::Clock;
use novagate_provider_core::{CooldownManager, CredentialPool, Event, EventHub, ModelAlias, Provider, ProviderRegistry, QuotaMirror};
use novagate_router::{PerformanceMirror, Router, RouterBuildError};
use novagate_storage::Journal;

use crate::auth::{AuthSnapshot, ClientKey, KeyStore};
use crate::upstream_client::UpstreamClient;

/// Everything an external `ConfigSource` loader produces: the provider and
/// alias tables the Router indexes, and the client keys the Key Store
/// validates against. Deliberately flat and swapped wholesale — there is
/// no incremental patch API here, since config reload is rare relative to
/// request volume and a full rebuild is trivially correct.
#[derive(Debug, Clone, Default)]
pub struct ConfigSnapshot {
    pub providers: Vec<Provider>,
    pub aliases: Vec<ModelAlias>,
    pub client_keys: Vec<ClientKey>,
    pub max_attempts: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(String),
    #[error(transparent)]
    Router(#[from] RouterBuildError),
}

/// The external collaborator that owns config persistence and the
/// admin-HTTP write surface (both explicitly out of scope for this crate).
/// The core only ever calls `load`; how the snapshot was produced — a
/// file watch, a database read, an env var — is this trait's business, not
/// `AppState`'s.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<ConfigSnapshot, ConfigError>;
}

struct RouterState {
    router: Router,
}

/// Everything the handler and Dispatcher reach through: the swappable
/// Router/Key-Store snapshot, plus every other component's shared handle.
pub struct AppState {
    router_state: ArcSwap<RouterState>,
    key_store: Arc<KeyStore>,
    pub cooldown: Arc<CooldownManager>,
    pub performance: Arc<PerformanceMirror>,
    pub quota: QuotaMirror,
    pub credentials: Arc<CredentialPool>,
    pub events: EventHub,
    pub registry: Arc<ProviderRegistry>,
    pub journal: Arc<Journal>,
    pub clock: Arc<dyn Clock>,
    pub http: Arc<dyn UpstreamClient>,
    pub max_attempts: std::sync::atomic::AtomicUsize,
}

impl AppState {
    pub fn new(
        snapshot: ConfigSnapshot,
        cooldown: Arc<CooldownManager>,
        performance: Arc<PerformanceMirror>,
        quota: QuotaMirror,
        credentials: Arc<CredentialPool>,
        events: EventHub,
        registry: Arc<ProviderRegistry>,
        journal: Arc<Journal>,
        clock: Arc<dyn Clock>,
        http: Arc<dyn UpstreamClient>,
    ) -> Result<Self, ConfigError> {
        let max_attempts = snapshot.max_attempts.max(1);
        let router = Router::build(snapshot.providers.clone(), snapshot.aliases.clone())?;
        let key_store = Arc::new(KeyStore::new(AuthSnapshot {
            keys: snapshot.client_keys.clone(),
        }));
        Ok(Self {
            router_state: ArcSwap::from_pointee(RouterState { router }),
            key_store,
            cooldown,
            performance,
            quota,
            credentials,
            events,
            registry,
            journal,
            clock,
            http,
            max_attempts: std::sync::atomic::AtomicUsize::new(max_attempts),
        })
    }

    pub fn router(&self) -> arc_swap::Guard<Arc<RouterState>> {
        self.router_state.load()
    }

    pub fn key_store(&self) -> &KeyStore {
        &self.key_store
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Rebuilds the Router and Key Store wholesale from a freshly-loaded
    /// snapshot. Callers (the `ConfigSource`'s file-watch loop, or a signal
    /// handler) hold no lock across this — in-flight requests keep using
    /// the pointer they captured at task start.
    pub fn reload(&self, snapshot: ConfigSnapshot) -> Result<(), ConfigError> {
        let router = Router::build(snapshot.providers, snapshot.aliases)?;
        self.router_state.store(Arc::new(RouterState { router }));
        self.key_store.replace_snapshot(AuthSnapshot {
            keys: snapshot.client_keys,
        });
        self.max_attempts
            .store(snapshot.max_attempts.max(1), std::sync::atomic::Ordering::Relaxed);
        Ok(())
    }
}

impl std::ops::Deref for RouterState {
    type Target = Router;

    fn deref(&self) -> &Router {
        &self.router
    }
}

/// Convenience used by the admin surface's cooldown-list endpoint and by
/// tests; not part of the hot path.
pub async fn emit_operational(events: &EventHub, event: Event) {
    events.emit(event).await;
}
