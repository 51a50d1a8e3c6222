use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use entity::daily_digest;
use entity::daily_digest::TopicCategories;

use crate::{
    digest::{
        batch, categorize, merge,
        stores::{DigestStore, MessageStore, NewDigest},
    },
    error::{AppError, AppResult},
    prompt::Generate,
    server_config::cfg,
    util,
};

/// Pipeline knobs, injected so the orchestrator is testable without the
/// global config.
#[derive(Debug, Clone)]
pub struct DigestSettings {
    pub batch_size: usize,
    pub batch_summary_max_tokens: u32,
    pub digest_max_tokens: u32,
    /// Historical behavior: emails whose batch failed to summarize are still
    /// marked summarized once the digest is persisted. Setting this to false
    /// leaves them for a future run, which only picks them up if that day's
    /// digest does not exist yet.
    pub mark_failed_batches: bool,
}

impl DigestSettings {
    pub fn from_config() -> Self {
        Self {
            batch_size: cfg.digest.batch_size,
            batch_summary_max_tokens: cfg.model.batch_summary_max_tokens,
            digest_max_tokens: cfg.model.digest_max_tokens,
            mark_failed_batches: cfg.digest.mark_failed_batches,
        }
    }
}

/// Drives one digest run for a target calendar date:
/// check-existing -> fetch -> partition/summarize -> categorize -> merge ->
/// persist -> mark-consumed. Generation calls are sequential; the only
/// concurrency control is the store's unique constraint on the digest date.
pub struct DigestOrchestrator {
    messages: Arc<dyn MessageStore>,
    digests: Arc<dyn DigestStore>,
    generator: Arc<dyn Generate>,
    settings: DigestSettings,
}

impl DigestOrchestrator {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        digests: Arc<dyn DigestStore>,
        generator: Arc<dyn Generate>,
        settings: DigestSettings,
    ) -> Self {
        Self {
            messages,
            digests,
            generator,
            settings,
        }
    }

    /// Returns the digest for `date`, generating and persisting it if needed.
    /// `Ok(None)` means no digest was produced: either no unsummarized emails
    /// exist in range, or every summary batch failed.
    pub async fn run_for_date(&self, date: NaiveDate) -> AppResult<Option<daily_digest::Model>> {
        if let Some(existing) = self.digests.find_by_date(date).await? {
            tracing::info!("Digest for {} already exists, skipping generation", date);
            return Ok(Some(existing));
        }

        let (start, end) = util::day_bounds(date);
        let messages = self.messages.find_unsummarized(start, end).await?;
        if messages.is_empty() {
            tracing::info!("No unsummarized emails for {}, no digest produced", date);
            return Ok(None);
        }
        tracing::info!(
            "Generating digest for {} from {} emails",
            date,
            messages.len()
        );

        let batches = batch::partition(&messages, self.settings.batch_size);
        let batch_count = batches.len();
        let summaries = batch::summarize_batches(
            self.generator.as_ref(),
            date,
            batches,
            self.settings.batch_summary_max_tokens,
        )
        .await;
        if summaries.is_empty() {
            tracing::warn!(
                "All {} summary batches failed for {}, no digest produced",
                batch_count,
                date
            );
            return Ok(None);
        }

        let categories = categorize::categorize(self.generator.as_ref(), date, &messages).await;

        let content = merge::merge_summaries(
            self.generator.as_ref(),
            date,
            &summaries,
            self.settings.digest_max_tokens,
        )
        .await?;

        let to_mark: Vec<String> = if self.settings.mark_failed_batches {
            messages.iter().map(|m| m.id.clone()).collect()
        } else {
            summaries
                .iter()
                .flat_map(|s| s.batch.iter().map(|m| m.id.clone()))
                .collect()
        };

        let new_digest = NewDigest {
            digest_date: date,
            content,
            categories: TopicCategories(categories),
            email_count: messages.len() as i32,
            email_ids: messages.iter().map(|m| m.id.clone()).collect(),
        };

        let digest = match self.digests.insert(new_digest).await {
            Ok(digest) => digest,
            Err(AppError::Conflict(msg)) => {
                // Lost the race to a concurrent run; that run owns marking.
                tracing::warn!(
                    "Digest for {} was created concurrently ({}), returning existing",
                    date,
                    msg
                );
                let existing = self.digests.find_by_date(date).await?.context(format!(
                    "Digest insert for {} conflicted but no existing row found",
                    date
                ))?;
                return Ok(Some(existing));
            }
            Err(e) => return Err(e),
        };

        match self.messages.mark_summarized(&to_mark).await {
            Ok(count) => {
                tracing::debug!("Marked {} emails summarized for digest {}", count, date);
            }
            Err(e) => {
                // The digest stays; the unmarked emails surface again on a
                // future run, where the check-existing step short-circuits
                // before they could be double-counted.
                tracing::error!(
                    "Digest {} persisted but marking {} emails summarized failed: {:?} ids={:?}",
                    date,
                    to_mark.len(),
                    e,
                    to_mark
                );
            }
        }

        Ok(Some(digest))
    }
}
