use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

/// One row per completed request; the accounting source of truth. Never
/// dropped by the journal's overflow policy.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "usage_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique_key = "usage_records_request_id")]
    pub request_id: String,
    pub ts: OffsetDateTime,
    pub client_key_name: String,
    pub alias_requested: String,
    pub alias_used: String,
    pub provider_id: String,
    pub upstream_model: String,
    pub api_family_in: String,
    pub api_family_out: String,
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
    pub cached_tokens: Option<i64>,
    pub cache_write_tokens: Option<i64>,
    pub cost_usd: Option<f64>,
    pub ttft_ms: Option<i64>,
    pub total_ms: i64,
    pub tokens_per_sec: Option<f64>,
    pub streamed: bool,
    pub ok: bool,
}

impl ActiveModelBehavior for ActiveModel {}
