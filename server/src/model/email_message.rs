use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entity::{email_message, prelude::*};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Value,
};

use crate::{digest::stores::MessageStore, error::AppResult};

pub struct PgMessageStore {
    conn: DatabaseConnection,
}

impl PgMessageStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn find_unsummarized(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<email_message::Model>> {
        let messages = EmailMessage::find()
            .filter(email_message::Column::IsSummarized.eq(false))
            .filter(email_message::Column::ReceivedAt.gte(start))
            .filter(email_message::Column::ReceivedAt.lte(end))
            .order_by_asc(email_message::Column::ReceivedAt)
            .all(&self.conn)
            .await?;

        Ok(messages)
    }

    async fn mark_summarized(&self, ids: &[String]) -> AppResult<u64> {
        let result = EmailMessage::update_many()
            .col_expr(
                email_message::Column::IsSummarized,
                Value::Bool(Some(true)).into(),
            )
            .filter(email_message::Column::Id.is_in(ids.iter().cloned()))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::{DbBackend, QueryTrait};

    use super::*;

    #[test]
    fn test_mark_summarized_query() {
        let query = EmailMessage::update_many()
            .col_expr(
                email_message::Column::IsSummarized,
                Value::Bool(Some(true)).into(),
            )
            .filter(email_message::Column::Id.is_in(["a".to_string(), "b".to_string()]))
            .build(DbBackend::Postgres)
            .to_string();

        assert_eq!(
            query,
            "UPDATE \"email_message\" SET \"is_summarized\" = TRUE WHERE \"email_message\".\"id\" IN ('a', 'b')"
        );
    }
}
