//! Router: resolves a client-requested alias (or passthrough target) to an
//! ordered list of `(providerId, upstreamModel)` targets for the Dispatcher
//! to walk as a failover chain.
//!
//! Indices (`alias_index`, `providers`) are rebuilt from scratch on every
//! config-snapshot swap rather than patched incrementally, since a snapshot
//! swap is rare relative to `resolve` calls and a full rebuild keeps the
//! index trivially correct.

pub mod performance;
mod selector;

use std::collections::HashMap;

use novagate_common::Clock;
use novagate_protocol::ApiFamily;
use novagate_provider_core::{CooldownManager, ModelAlias, Priority, Provider};
use serde::{Deserialize, Serialize};

pub use performance::PerformanceMirror;
pub use selector::Candidate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTarget {
    pub provider_id: String,
    pub upstream_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveOutcome {
    pub ordered_targets: Vec<ResolvedTarget>,
    pub alias_used: String,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("alias not found: {0}")]
    AliasNotFound(String),
    #[error("no enabled targets for alias: {0}")]
    NoEnabledTargets(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RouterBuildError {
    #[error("duplicate alias id or additional alias: {0}")]
    DuplicateAlias(String),
}

/// A resolved snapshot of providers and aliases, indexed for O(1) lookup.
///
/// Rebuilt wholesale on every config-snapshot swap (see module docs);
/// `Router::build` is the only way to construct one, so a `Router` is always
/// internally consistent with the provider/alias set it was built from.
pub struct Router {
    providers: HashMap<String, Provider>,
    aliases: HashMap<String, ModelAlias>,
    /// Every alias id and additional alias string, mapped to the alias's
    /// canonical id.
    alias_index: HashMap<String, String>,
}

impl Router {
    pub fn build(providers: Vec<Provider>, aliases: Vec<ModelAlias>) -> Result<Self, RouterBuildError> {
        let mut alias_index = HashMap::new();
        let mut by_id = HashMap::new();
        for alias in aliases {
            if alias_index.insert(alias.id.clone(), alias.id.clone()).is_some() {
                return Err(RouterBuildError::DuplicateAlias(alias.id));
            }
            for extra in &alias.additional_aliases {
                if alias_index.insert(extra.clone(), alias.id.clone()).is_some() {
                    return Err(RouterBuildError::DuplicateAlias(extra.clone()));
                }
            }
            by_id.insert(alias.id.clone(), alias);
        }
        let providers = providers.into_iter().map(|p| (p.id.clone(), p)).collect();
        Ok(Self {
            providers,
            aliases: by_id,
            alias_index,
        })
    }

    pub fn provider(&self, id: &str) -> Option<&Provider> {
        self.providers.get(id)
    }

    /// Resolve `requested` (an alias name, or a `provider/model` passthrough
    /// target) to an ordered failover chain.
    pub async fn resolve(
        &self,
        requested: &str,
        client_api_family: ApiFamily,
        cooldown: &CooldownManager,
        perf: &PerformanceMirror,
        clock: &dyn Clock,
    ) -> Result<ResolveOutcome, ResolveError> {
        self.resolve_with_rng(
            requested,
            client_api_family,
            cooldown,
            perf,
            clock,
            &mut rand::rng(),
        )
        .await
    }

    pub async fn resolve_with_rng(
        &self,
        requested: &str,
        client_api_family: ApiFamily,
        cooldown: &CooldownManager,
        perf: &PerformanceMirror,
        clock: &dyn Clock,
        rng: &mut impl rand::Rng,
    ) -> Result<ResolveOutcome, ResolveError> {
        if let Some((provider_id, model)) = requested.split_once('/') {
            return self.resolve_passthrough(provider_id, model);
        }

        let canonical_id = self
            .alias_index
            .get(requested)
            .ok_or_else(|| ResolveError::AliasNotFound(requested.to_string()))?;
        let alias = self
            .aliases
            .get(canonical_id)
            .expect("alias_index entries always point at a present alias");

        let mut candidates: Vec<Candidate> = Vec::new();
        for target in &alias.targets {
            let Some(provider) = self.providers.get(&target.provider_id) else {
                continue;
            };
            if !provider.enabled {
                continue;
            }
            if cooldown
                .is_model_down(&target.provider_id, &target.upstream_model)
                .await
            {
                continue;
            }
            candidates.push(Candidate {
                provider_id: target.provider_id.clone(),
                upstream_model: target.upstream_model.clone(),
                weight: target.weight,
            });
        }
        if candidates.is_empty() {
            return Err(ResolveError::NoEnabledTargets(alias.id.clone()));
        }

        if alias.priority == Priority::ApiMatch {
            let matched: Vec<Candidate> = candidates
                .iter()
                .filter(|c| self.exposes_family_natively(c, client_api_family))
                .cloned()
                .collect();
            if !matched.is_empty() {
                candidates = matched;
            }
        }

        let ordered = selector::apply(
            alias.selector,
            candidates,
            &self.providers,
            perf,
            clock,
            rng,
        );

        let ordered_targets: Vec<ResolvedTarget> = ordered
            .into_iter()
            .map(|c| ResolvedTarget {
                provider_id: c.provider_id,
                upstream_model: c.upstream_model,
            })
            .collect();
        tracing::debug!(
            alias = %alias.id,
            targets = ordered_targets.len(),
            "resolved alias"
        );

        Ok(ResolveOutcome {
            ordered_targets,
            alias_used: alias.id.clone(),
        })
    }

    fn exposes_family_natively(&self, candidate: &Candidate, family: ApiFamily) -> bool {
        let Some(provider) = self.providers.get(&candidate.provider_id) else {
            return false;
        };
        if !provider.api_base_url.contains_key(&family) {
            return false;
        }
        let Some(model) = provider.models.get(&candidate.upstream_model) else {
            return false;
        };
        model.access_via.is_empty() || model.access_via.contains(&family)
    }

    fn resolve_passthrough(
        &self,
        provider_id: &str,
        model: &str,
    ) -> Result<ResolveOutcome, ResolveError> {
        let provider = self
            .providers
            .get(provider_id)
            .ok_or_else(|| ResolveError::AliasNotFound(format!("{provider_id}/{model}")))?;
        if !provider.models.contains_key(model) {
            return Err(ResolveError::AliasNotFound(format!("{provider_id}/{model}")));
        }
        if !provider.enabled {
            return Err(ResolveError::NoEnabledTargets(format!(
                "{provider_id}/{model}"
            )));
        }
        let alias_used = format!("{provider_id}/{model}");
        tracing::debug!(target = %alias_used, "resolved passthrough target, bypassing cooldown");
        Ok(ResolveOutcome {
            ordered_targets: vec![ResolvedTarget {
                provider_id: provider_id.to_string(),
                upstream_model: model.to_string(),
            }],
            alias_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use novagate_common::SystemClock;
    use novagate_provider_core::{
        AliasTarget, ModelEntry, ModelKind, Pricing, ProviderAuth, Selector,
    };

    use super::*;

    fn provider(id: &str, enabled: bool, models: &[&str]) -> Provider {
        Provider {
            id: id.to_string(),
            name: id.to_string(),
            enabled,
            api_base_url: HashMap::from([(ApiFamily::Chat, format!("https://{id}.example/v1"))]),
            auth: ProviderAuth::ApiKey {
                key: "k".to_string(),
            },
            headers: Vec::new(),
            extra_body: None,
            discount: None,
            models: models
                .iter()
                .map(|m| {
                    (
                        m.to_string(),
                        ModelEntry {
                            kind: ModelKind::Chat,
                            access_via: Vec::new(),
                            pricing: Pricing::Simple {
                                input: 1.0,
                                output: 2.0,
                                cached: 0.0,
                            },
                            estimate_tokens: false,
                        },
                    )
                })
                .collect(),
        }
    }

    fn alias(id: &str, targets: Vec<(&str, &str)>) -> ModelAlias {
        ModelAlias {
            id: id.to_string(),
            additional_aliases: Vec::new(),
            targets: targets
                .into_iter()
                .map(|(provider_id, upstream_model)| AliasTarget {
                    provider_id: provider_id.to_string(),
                    upstream_model: upstream_model.to_string(),
                    weight: 1.0,
                })
                .collect(),
            selector: Selector::InOrder,
            priority: Priority::Selector,
        }
    }

    #[tokio::test]
    async fn resolve_unknown_alias_is_alias_not_found() {
        let router = Router::build(vec![], vec![]).unwrap();
        let cooldown = CooldownManager::new();
        let perf = PerformanceMirror::new();
        let clock = SystemClock;
        let err = router
            .resolve("missing", ApiFamily::Chat, &cooldown, &perf, &clock)
            .await
            .unwrap_err();
        assert_eq!(err, ResolveError::AliasNotFound("missing".to_string()));
    }

    #[tokio::test]
    async fn resolve_filters_disabled_and_cooled_down_targets() {
        let providers = vec![
            provider("p1", true, &["m1"]),
            provider("p2", false, &["m1"]),
        ];
        let aliases = vec![alias("fast", vec![("p1", "m1"), ("p2", "m1")])];
        let router = Router::build(providers, aliases).unwrap();
        let cooldown = CooldownManager::new();
        let perf = PerformanceMirror::new();
        let clock = SystemClock;

        let outcome = router
            .resolve("fast", ApiFamily::Chat, &cooldown, &perf, &clock)
            .await
            .unwrap();
        assert_eq!(outcome.ordered_targets.len(), 1);
        assert_eq!(outcome.ordered_targets[0].provider_id, "p1");
    }

    #[tokio::test]
    async fn resolve_no_enabled_targets_when_all_cooled_down() {
        use novagate_provider_core::CooldownKey;

        let providers = vec![provider("p1", true, &["m1"])];
        let aliases = vec![alias("fast", vec![("p1", "m1")])];
        let router = Router::build(providers, aliases).unwrap();
        let cooldown = CooldownManager::new();
        cooldown
            .put(
                CooldownKey::Provider("p1".to_string()),
                std::time::Duration::from_secs(60),
                "test",
            )
            .await;
        let perf = PerformanceMirror::new();
        let clock = SystemClock;

        let err = router
            .resolve("fast", ApiFamily::Chat, &cooldown, &perf, &clock)
            .await
            .unwrap_err();
        assert_eq!(err, ResolveError::NoEnabledTargets("fast".to_string()));
    }

    #[tokio::test]
    async fn resolve_passthrough_bypasses_cooldown() {
        use novagate_provider_core::CooldownKey;

        let providers = vec![provider("p1", true, &["m1"])];
        let router = Router::build(providers, vec![]).unwrap();
        let cooldown = CooldownManager::new();
        cooldown
            .put(
                CooldownKey::Provider("p1".to_string()),
                std::time::Duration::from_secs(60),
                "test",
            )
            .await;
        let perf = PerformanceMirror::new();
        let clock = SystemClock;

        let outcome = router
            .resolve("p1/m1", ApiFamily::Chat, &cooldown, &perf, &clock)
            .await
            .unwrap();
        assert_eq!(outcome.alias_used, "p1/m1");
    }

    #[tokio::test]
    async fn resolve_passthrough_unknown_model_is_alias_not_found() {
        let providers = vec![provider("p1", true, &["m1"])];
        let router = Router::build(providers, vec![]).unwrap();
        let cooldown = CooldownManager::new();
        let perf = PerformanceMirror::new();
        let clock = SystemClock;

        let err = router
            .resolve("p1/unknown", ApiFamily::Chat, &cooldown, &perf, &clock)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::AliasNotFound("p1/unknown".to_string())
        );
    }

    #[tokio::test]
    async fn duplicate_alias_id_fails_build() {
        let aliases = vec![alias("dup", vec![]), alias("dup", vec![])];
        let err = Router::build(vec![], aliases).unwrap_err();
        assert!(matches!(err, RouterBuildError::DuplicateAlias(id) if id == "dup"));
    }

    #[tokio::test]
    async fn api_match_priority_restricts_to_native_targets() {
        let mut p2 = provider("p2", true, &["m1"]);
        p2.api_base_url = HashMap::from([(ApiFamily::Responses, "https://p2.example".to_string())]);
        let providers = vec![provider("p1", true, &["m1"]), p2];
        let mut a = alias("fast", vec![("p1", "m1"), ("p2", "m1")]);
        a.priority = Priority::ApiMatch;
        let router = Router::build(providers, vec![a]).unwrap();
        let cooldown = CooldownManager::new();
        let perf = PerformanceMirror::new();
        let clock = SystemClock;

        let outcome = router
            .resolve("fast", ApiFamily::Chat, &cooldown, &perf, &clock)
            .await
            .unwrap();
        assert_eq!(outcome.ordered_targets.len(), 1);
        assert_eq!(outcome.ordered_targets[0].provider_id, "p1");
    }
}
