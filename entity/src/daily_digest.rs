use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

/// One persisted daily digest. `digest_date` carries a unique constraint;
/// that constraint is the only concurrency control for digest creation.
/// Rows are immutable after insert except the distribution fields, which
/// transition `false -> true` once.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "daily_digest")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub digest_date: Date,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub categories: TopicCategories,
    pub email_count: i32,
    /// Weak references: the digest does not own message lifecycle.
    pub email_ids: Vec<String>,
    pub is_distributed: bool,
    pub distributed_at: Option<DateTimeUtc>,
    pub distributed_to: Vec<String>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub metadata: Option<Json>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct TopicCategories(pub Vec<TopicCategory>);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicCategory {
    pub name: String,
    pub description: String,
}
