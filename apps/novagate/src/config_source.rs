//! File-based `ConfigSource`: loads providers, aliases, and client keys from
//! a single JSON document, resolving `{env:NAME}` placeholders in provider
//! API keys against the process environment at load time.
//!
//! Config is a file this binary reads at startup, not a database an admin
//! surface mutates — there is no write path, only this loader.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use novagate_core::auth::ClientKey;
use novagate_core::state::{ConfigError, ConfigSnapshot, ConfigSource};
use novagate_provider_core::{ModelAlias, Provider, ProviderAuth};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    max_attempts: usize,
    #[serde(default)]
    providers: Vec<Provider>,
    #[serde(default)]
    aliases: Vec<ModelAlias>,
    #[serde(default)]
    client_keys: Vec<ClientKey>,
}

pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> Result<ConfigSnapshot, ConfigError> {
        load_config_file(&self.path)
    }
}

fn load_config_file(path: &Path) -> Result<ConfigSnapshot, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|err| ConfigError::Load(format!("read {}: {err}", path.display())))?;
    let mut file: ConfigFile =
        serde_json::from_str(&raw).map_err(|err| ConfigError::Load(format!("parse {}: {err}", path.display())))?;

    for provider in &mut file.providers {
        resolve_env_placeholders(provider);
    }
    validate_alias_uniqueness(&file.aliases)?;

    Ok(ConfigSnapshot {
        providers: file.providers,
        aliases: file.aliases,
        client_keys: file.client_keys,
        max_attempts: file.max_attempts,
    })
}

/// Resolves a `{env:NAME}` placeholder in a provider's API key against the
/// process environment. A provider referencing a variable that isn't set is
/// disabled rather than failing the whole config load, so one missing
/// credential doesn't take down every other provider.
fn resolve_env_placeholders(provider: &mut Provider) {
    let ProviderAuth::ApiKey { key } = &mut provider.auth else {
        return;
    };
    let Some(name) = env_placeholder_name(key) else {
        return;
    };
    match std::env::var(&name) {
        Ok(value) => *key = value,
        Err(_) => {
            tracing::warn!(
                provider = %provider.id,
                env_var = %name,
                "provider references an unset environment variable; disabling"
            );
            provider.enabled = false;
        }
    }
}

fn env_placeholder_name(value: &str) -> Option<String> {
    let inner = value.strip_prefix("{env:")?.strip_suffix('}')?;
    Some(inner.to_string())
}

/// Every alias id and additional alias must be unique across the whole set;
/// a collision fails the load before any request is served from it.
fn validate_alias_uniqueness(aliases: &[ModelAlias]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for alias in aliases {
        if !seen.insert(alias.id.as_str()) {
            return Err(ConfigError::Load(format!("duplicate model alias id: {}", alias.id)));
        }
        for extra in &alias.additional_aliases {
            if !seen.insert(extra.as_str()) {
                return Err(ConfigError::Load(format!("duplicate model alias id: {extra}")));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use novagate_provider_core::{Priority, Selector};

    #[test]
    fn env_placeholder_name_parses_braces() {
        assert_eq!(env_placeholder_name("{env:OPENAI_KEY}"), Some("OPENAI_KEY".to_string()));
        assert_eq!(env_placeholder_name("sk-literal"), None);
    }

    fn alias(id: &str) -> ModelAlias {
        ModelAlias {
            id: id.to_string(),
            additional_aliases: vec![],
            targets: vec![],
            selector: Selector::InOrder,
            priority: Priority::Selector,
        }
    }

    #[test]
    fn duplicate_alias_ids_are_rejected() {
        let aliases = vec![alias("gpt-4"), alias("gpt-4")];
        assert!(validate_alias_uniqueness(&aliases).is_err());
    }

    #[test]
    fn distinct_alias_ids_are_accepted() {
        let aliases = vec![alias("gpt-4"), alias("claude-sonnet")];
        assert!(validate_alias_uniqueness(&aliases).is_ok());
    }

    #[test]
    fn missing_config_file_is_a_load_error() {
        let source = FileConfigSource::new("/nonexistent/path/novagate.json");
        assert!(source.load().is_err());
    }

    #[test]
    fn loads_providers_aliases_and_keys_from_a_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("novagate.json");
        std::fs::write(
            &path,
            r#"{
                "max_attempts": 3,
                "providers": [
                    {
                        "id": "openai",
                        "name": "OpenAI",
                        "enabled": true,
                        "api_base_url": {},
                        "auth": {"kind": "api_key", "key": "{env:NOVAGATE_TEST_OPENAI_KEY}"},
                        "headers": [],
                        "extra_body": {},
                        "discount": null,
                        "models": {}
                    }
                ],
                "aliases": [],
                "client_keys": [
                    {"name": "alice", "key": "sk-alice", "enabled": true}
                ]
            }"#,
        )
        .unwrap();

        unsafe {
            std::env::set_var("NOVAGATE_TEST_OPENAI_KEY", "sk-resolved");
        }
        let snapshot = FileConfigSource::new(path).load().unwrap();
        unsafe {
            std::env::remove_var("NOVAGATE_TEST_OPENAI_KEY");
        }

        assert_eq!(snapshot.max_attempts, 3);
        assert_eq!(snapshot.client_keys.len(), 1);
        assert_eq!(snapshot.providers.len(), 1);
        let ProviderAuth::ApiKey { key } = &snapshot.providers[0].auth else {
            panic!("expected api key auth");
        };
        assert_eq!(key, "sk-resolved");
        assert!(snapshot.providers[0].enabled);
    }

    #[test]
    fn missing_env_var_disables_the_provider_instead_of_failing_the_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("novagate.json");
        std::fs::write(
            &path,
            r#"{
                "providers": [
                    {
                        "id": "openai",
                        "name": "OpenAI",
                        "enabled": true,
                        "api_base_url": {},
                        "auth": {"kind": "api_key", "key": "{env:NOVAGATE_TEST_UNSET_KEY}"},
                        "headers": [],
                        "extra_body": {},
                        "discount": null,
                        "models": {}
                    }
                ],
                "aliases": [],
                "client_keys": []
            }"#,
        )
        .unwrap();

        let snapshot = FileConfigSource::new(path).load().unwrap();
        assert!(!snapshot.providers[0].enabled);
    }
}
