use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "error_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub request_id: String,
    pub ts: OffsetDateTime,
    pub kind: String,
    pub provider_id: Option<String>,
    pub upstream_model: Option<String>,
    pub status_code: Option<i32>,
    pub message: String,
    pub stack: Option<String>,
    pub headers_json: Option<Json>,
    pub provider_response_json: Option<Json>,
}

impl ActiveModelBehavior for ActiveModel {}
