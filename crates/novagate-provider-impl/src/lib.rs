//! Concrete [`UpstreamProvider`] implementations: a generic api-key provider
//! for every key-authenticated upstream, plus the two OAuth-subscription
//! backends (Codex, Claude Code) that need their own login dance.
//!
//! `builtin_providers` is the registration entry point `novagate-core`'s
//! bootstrap calls once at startup to populate the [`ProviderRegistry`],
//! grounded on `gproxy-provider-impl/src/lib.rs`'s own builtin-seed list
//! (simplified: per-vendor custom providers are config-driven through
//! `ApiKeyProvider` here instead of one struct per vendor).

mod api_key;
mod claudecode;
mod codex;
mod env;
mod http_client;
mod oauth_common;

use std::sync::Arc;

use novagate_provider_core::UpstreamProvider;

pub use api_key::ApiKeyProvider;
pub use claudecode::ClaudeCodeProvider;
pub use codex::CodexProvider;

/// The providers every deployment gets for free, before any config-driven
/// custom provider is added. Keyed by `UpstreamProvider::name()`:
/// `"api_key"`, `"codex"`, `"claudecode"`.
pub fn builtin_providers() -> Vec<Arc<dyn UpstreamProvider>> {
    vec![
        Arc::new(ApiKeyProvider::new()),
        Arc::new(CodexProvider::new()),
        Arc::new(ClaudeCodeProvider::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_providers_cover_the_three_kinds() {
        let providers = builtin_providers();
        let names: Vec<&'static str> = providers.iter().map(|p| p.name()).collect();
        assert!(names.contains(&"api_key"));
        assert!(names.contains(&"codex"));
        assert!(names.contains(&"claudecode"));
    }
}
