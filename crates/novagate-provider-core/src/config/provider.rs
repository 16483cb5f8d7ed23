use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use novagate_protocol::ApiFamily;

/// Sentinel used in place of a real URL for providers whose auth is OAuth-only
/// and whose base URL is implied by the provider kind rather than configured.
pub const OAUTH_URL_SENTINEL: &str = "oauth://";

/// A single upstream provider: its supported API surface, authentication, and
/// the set of upstream models it exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    /// Family -> base URL, or [`OAUTH_URL_SENTINEL`] for OAuth-implied endpoints.
    pub api_base_url: HashMap<ApiFamily, String>,
    pub auth: ProviderAuth,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_body: Option<serde_json::Value>,
    /// Multiplicative price discount in `[0, 1]`, applied at accounting time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<f64>,
    pub models: HashMap<String, ModelEntry>,
}

impl Provider {
    /// The API families this provider has a configured endpoint for.
    pub fn supported_families(&self) -> impl Iterator<Item = ApiFamily> + '_ {
        self.api_base_url.keys().copied()
    }

    pub fn is_oauth(&self) -> bool {
        matches!(self.auth, ProviderAuth::OAuth { .. })
    }
}

/// Exactly one of these is set on a [`Provider`] (enforced by the config loader,
/// not by the type itself, since both arms serialize into the same `auth` key
/// via different shapes read from the persisted store).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderAuth {
    ApiKey {
        /// May contain an unresolved `{env:NAME}` placeholder until config load.
        key: String,
    },
    OAuth {
        provider_kind: OAuthProviderKind,
        account_id: String,
    },
}

/// Representative OAuth-capable provider kinds. Each drives its own device/PKCE
/// flow in `novagate-provider-impl::oauth`; this enum only names *which* flow a
/// session or credential bundle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthProviderKind {
    Codex,
    ClaudeCode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub kind: ModelKind,
    /// Families this model may be invoked through; defaults to everything the
    /// provider supports when left empty by the config loader.
    #[serde(default)]
    pub access_via: Vec<ApiFamily>,
    pub pricing: Pricing,
    /// When the upstream never returns a usage block, fall back to the
    /// character-based heuristic in `novagate-transform::usage`.
    #[serde(default)]
    pub estimate_tokens: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Chat,
    Embeddings,
    Transcriptions,
    Speech,
    Image,
    Responses,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Pricing {
    Simple {
        input: f64,
        output: f64,
        #[serde(default)]
        cached: f64,
    },
    Openrouter {
        slug: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        discount: Option<f64>,
    },
    Ranges {
        /// Half-open `[lo, hi)` ranges over prompt-token count, sorted and
        /// non-overlapping; `hi == 0` denotes unbounded.
        ranges: Vec<PricingRange>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PricingRange {
    pub lo: u64,
    pub hi: u64,
    pub input: f64,
    pub output: f64,
    #[serde(default)]
    pub cached: f64,
}

impl Pricing {
    /// Estimated cost in USD for a nominal request with the given prompt and
    /// completion token counts, before any provider-level discount.
    pub fn estimate_cost(&self, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        match self {
            Pricing::Simple {
                input, output, ..
            } => {
                (prompt_tokens as f64 / 1000.0) * input + (completion_tokens as f64 / 1000.0) * output
            }
            Pricing::Openrouter { discount, .. } => {
                // No local price table for openrouter-routed models; callers
                // should already have resolved a `Simple` shadow price at
                // config-load time. Absent that, cost is unknown.
                let _ = discount;
                0.0
            }
            Pricing::Ranges { ranges } => {
                let row = ranges
                    .iter()
                    .find(|r| prompt_tokens >= r.lo && (r.hi == 0 || prompt_tokens < r.hi));
                match row {
                    Some(r) => {
                        (prompt_tokens as f64 / 1000.0) * r.input
                            + (completion_tokens as f64 / 1000.0) * r.output
                    }
                    None => 0.0,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_pricing_picks_matching_bucket() {
        let pricing = Pricing::Ranges {
            ranges: vec![
                PricingRange {
                    lo: 0,
                    hi: 128_000,
                    input: 1.0,
                    output: 2.0,
                    cached: 0.0,
                },
                PricingRange {
                    lo: 128_000,
                    hi: 0,
                    input: 2.0,
                    output: 4.0,
                    cached: 0.0,
                },
            ],
        };
        assert_eq!(pricing.estimate_cost(1_000, 1_000), 3.0);
        assert_eq!(pricing.estimate_cost(200_000, 1_000), 6.0);
    }
}
