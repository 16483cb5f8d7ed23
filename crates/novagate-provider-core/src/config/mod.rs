mod alias;
mod provider;

pub use alias::{AliasTarget, ModelAlias, Priority, Selector, UsageBy};
pub use provider::{
    ModelEntry, ModelKind, OAuthProviderKind, Pricing, PricingRange, Provider, ProviderAuth,
    OAUTH_URL_SENTINEL,
};
