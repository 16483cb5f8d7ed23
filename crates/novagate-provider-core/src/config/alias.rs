use serde::{Deserialize, Serialize};

/// A logical model name clients address; resolves to an ordered list of
/// `(providerId, upstreamModel)` targets that the Dispatcher walks as a
/// failover chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelAlias {
    pub id: String,
    #[serde(default)]
    pub additional_aliases: Vec<String>,
    pub targets: Vec<AliasTarget>,
    pub selector: Selector,
    pub priority: Priority,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasTarget {
    pub provider_id: String,
    pub upstream_model: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selector {
    Random,
    InOrder,
    Cost,
    Latency,
    Performance,
    /// Open question (spec's data model leaves the metric unspecified):
    /// resolved to `UsageBy::Requests` as the default, with `Tokens` available
    /// for deployments that want to load-spread on token volume instead.
    Usage {
        #[serde(default)]
        by: UsageBy,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageBy {
    #[default]
    Requests,
    Tokens,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Selector,
    ApiMatch,
}
