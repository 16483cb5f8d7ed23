use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "debug_traces")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub request_id: String,
    pub ts: OffsetDateTime,
    pub raw_request: Json,
    pub transformed_request: Option<Json>,
    pub raw_response: Option<Json>,
    pub transformed_response: Option<Json>,
    /// Ordered `CanonicalSnapshot` deltas captured over the life of a
    /// streamed response; empty for buffered calls.
    pub snapshots: Json,
}

impl ActiveModelBehavior for ActiveModel {}
