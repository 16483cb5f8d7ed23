//! The gateway's request-handling core: authentication, request
//! classification, routing/failover dispatch, and the axum surface that
//! wires them to the 8 inbound path families.
//!
//! The admin-mutation write surface is not here — config persistence and
//! reload live in `apps/novagate`'s `ConfigSource` instead.

pub mod auth;
pub mod bootstrap;
pub mod classify;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod state;
pub mod upstream_client;

pub use auth::{AuthContext, AuthError, AuthProvider, AuthSnapshot, ClientKey, KeyStore};
pub use classify::ClassifiedRequest;
pub use dispatch::Dispatcher;
pub use error::{ErrorKind, ProxyError};
pub use state::{AppState, ConfigError, ConfigSnapshot, ConfigSource};
pub use upstream_client::{ReqwestUpstreamClient, UpstreamClient, UpstreamClientConfig};
