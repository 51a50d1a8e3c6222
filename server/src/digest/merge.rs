use chrono::NaiveDate;
use indoc::formatdoc;

use crate::{
    digest::batch::BatchSummary,
    error::AppResult,
    prompt::{Generate, GenerateOptions},
};

/// Human-visible separator between batch summaries in the merge prompt.
pub(crate) const BATCH_SUMMARY_SEPARATOR: &str = "\n\n---\n\n";

/// Merge the per-batch summaries into one consolidated digest text. Backend
/// failure here is fatal to the run and propagates to the orchestrator, which
/// aborts without persisting anything.
pub async fn merge_summaries(
    generator: &dyn Generate,
    date: NaiveDate,
    summaries: &[BatchSummary<'_>],
    max_tokens: u32,
) -> AppResult<String> {
    let combined = summaries
        .iter()
        .map(|s| s.summary.as_str())
        .collect::<Vec<_>>()
        .join(BATCH_SUMMARY_SEPARATOR);

    let prompt = merge_prompt(date, &combined);
    let options = GenerateOptions {
        max_tokens: Some(max_tokens),
        ..Default::default()
    };

    generator.generate(&prompt, options).await
}

fn merge_prompt(date: NaiveDate, combined: &str) -> String {
    formatdoc! {"
        The sections below, separated by ---, each summarize part of the email received on {date}.
        Combine them into a single coherent digest, deduplicating overlapping points and keeping anything that needs action.

        {combined}"}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::common::{test_message, FakeGenerator, FakeReply};
    use chrono::Utc;

    #[tokio::test]
    async fn test_merge_combines_in_order() {
        let msgs = vec![test_message("m1", Utc::now())];
        let summaries = vec![
            BatchSummary {
                batch: &msgs,
                summary: "first part".to_string(),
            },
            BatchSummary {
                batch: &msgs,
                summary: "second part".to_string(),
            },
        ];
        let generator = FakeGenerator::always("the digest");

        let content = merge_summaries(&generator, Utc::now().date_naive(), &summaries, 1200)
            .await
            .unwrap();
        assert_eq!(content, "the digest");

        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 1);
        let expected = format!("first part{}second part", BATCH_SUMMARY_SEPARATOR);
        assert!(prompts[0].contains(&expected));
    }

    #[tokio::test]
    async fn test_merge_failure_propagates() {
        let msgs = vec![test_message("m1", Utc::now())];
        let summaries = vec![BatchSummary {
            batch: &msgs,
            summary: "only part".to_string(),
        }];
        let generator = FakeGenerator::scripted(vec![FakeReply::Fail]);

        let result = merge_summaries(&generator, Utc::now().date_naive(), &summaries, 1200).await;

        assert!(result.is_err());
    }
}
