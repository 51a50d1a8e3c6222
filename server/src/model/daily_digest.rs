use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use entity::{daily_digest, prelude::*};
use sea_orm::{
    ActiveModelTrait,
    ActiveValue::{NotSet, Set},
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};

use crate::{
    digest::stores::{DigestStore, NewDigest},
    error::{is_unique_violation, AppError, AppResult},
};

pub struct PgDigestStore {
    conn: DatabaseConnection,
}

impl PgDigestStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl DigestStore for PgDigestStore {
    async fn find_by_date(&self, date: NaiveDate) -> AppResult<Option<daily_digest::Model>> {
        let digest = DailyDigest::find()
            .filter(daily_digest::Column::DigestDate.eq(date))
            .one(&self.conn)
            .await?;

        Ok(digest)
    }

    async fn insert(&self, digest: NewDigest) -> AppResult<daily_digest::Model> {
        let date = digest.digest_date;
        let active = daily_digest::ActiveModel {
            id: NotSet,
            digest_date: Set(digest.digest_date),
            content: Set(digest.content),
            categories: Set(digest.categories),
            email_count: Set(digest.email_count),
            email_ids: Set(digest.email_ids),
            is_distributed: Set(false),
            distributed_at: Set(None),
            distributed_to: Set(vec![]),
            metadata: Set(None),
        };

        match active.insert(&self.conn).await {
            Ok(model) => Ok(model),
            Err(e) if is_unique_violation(&e) => Err(AppError::Conflict(format!(
                "Digest for {} already exists",
                date
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: i32) -> AppResult<Option<daily_digest::Model>> {
        let digest = DailyDigest::find_by_id(id).one(&self.conn).await?;

        Ok(digest)
    }

    async fn mark_distributed(
        &self,
        id: i32,
        recipients: Vec<String>,
    ) -> AppResult<daily_digest::Model> {
        let digest = DailyDigest::find_by_id(id)
            .one(&self.conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Digest {} not found", id)))?;

        let mut active: daily_digest::ActiveModel = digest.into();
        active.is_distributed = Set(true);
        active.distributed_at = Set(Some(Utc::now()));
        active.distributed_to = Set(recipients);

        let updated = active.update(&self.conn).await?;

        Ok(updated)
    }
}
