//! Shared primitives for novagate: ids, clock, and the settings snapshot.
//!
//! This crate intentionally does **not** depend on axum, tokio, or any
//! concrete HTTP client — it is the one dependency every other crate in the
//! workspace can take without pulling in IO.

mod clock;
mod ids;
mod settings;

pub use clock::{Clock, SystemClock};
pub use ids::{new_request_id, new_trace_id};
pub use settings::{Settings, SettingsError, SettingsPatch};
