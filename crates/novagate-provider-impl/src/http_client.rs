//! A single cached [`reqwest::Client`] shared by every OAuth token-exchange
//! call in this crate.
//!
//! Grounded on `providers/http_client.rs`'s cached-client-per-key pattern,
//! collapsed to one client: `UpstreamCtx` carries no per-request proxy or
//! browser-impersonation knobs here, so there is nothing left to key on.
//! A browser-impersonation fork of reqwest is dropped in favor of plain
//! `reqwest`, as already noted in the crate's dependency ledger.

use std::sync::OnceLock;

use novagate_provider_core::ProviderError;

static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

pub(crate) fn shared_client() -> Result<&'static reqwest::Client, ProviderError> {
    if let Some(client) = CLIENT.get() {
        return Ok(client);
    }
    let client = reqwest::Client::builder()
        .build()
        .map_err(|err| ProviderError::Other(err.to_string()))?;
    Ok(CLIENT.get_or_init(|| client))
}
