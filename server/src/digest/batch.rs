use chrono::NaiveDate;
use entity::email_message;
use indoc::formatdoc;

use crate::{
    email::prepared_message::prompt_body,
    prompt::{Generate, GenerateOptions},
};

/// Delimiter between individual emails inside one batch prompt.
pub(crate) const MESSAGE_BLOCK_SEPARATOR: &str = "\n\n=====\n\n";

/// One batch of messages paired with its generated summary.
pub struct BatchSummary<'a> {
    pub batch: &'a [email_message::Model],
    pub summary: String,
}

/// Split an ordered message list into contiguous chunks of `batch_size`,
/// the last chunk holding the remainder. Empty input yields no chunks.
pub fn partition(
    messages: &[email_message::Model],
    batch_size: usize,
) -> Vec<&[email_message::Model]> {
    messages.chunks(batch_size.max(1)).collect()
}

/// Summarize each batch through the generation backend, sequentially and in
/// order. A failed batch is logged and skipped; it does not abort the
/// remaining batches. Returns one entry per successful batch.
pub async fn summarize_batches<'a>(
    generator: &dyn Generate,
    date: NaiveDate,
    batches: Vec<&'a [email_message::Model]>,
    max_tokens: u32,
) -> Vec<BatchSummary<'a>> {
    let mut summaries = Vec::with_capacity(batches.len());

    for (index, batch) in batches.into_iter().enumerate() {
        let prompt = batch_summary_prompt(batch);
        let options = GenerateOptions {
            max_tokens: Some(max_tokens),
            ..Default::default()
        };

        match generator.generate(&prompt, options).await {
            Ok(summary) => summaries.push(BatchSummary { batch, summary }),
            Err(e) => {
                tracing::warn!(
                    "Summary for batch {} of digest {} failed, skipping {} emails: {:?}",
                    index,
                    date,
                    batch.len(),
                    e
                );
            }
        }
    }

    summaries
}

fn render_message(msg: &email_message::Model) -> String {
    formatdoc! {"
        From: {from}
        Subject: {subject}
        Received: {received}
        {body}",
        from = msg.from,
        subject = msg.subject.as_deref().unwrap_or("(no subject)"),
        received = msg.received_at.format("%Y-%m-%d %H:%M"),
        body = prompt_body(msg),
    }
}

fn batch_summary_prompt(batch: &[email_message::Model]) -> String {
    let rendered = batch
        .iter()
        .map(render_message)
        .collect::<Vec<_>>()
        .join(MESSAGE_BLOCK_SEPARATOR);

    formatdoc! {"
        You are an assistant that summarizes email activity.
        Write a concise prose summary of the emails below, covering who wrote, what about, and anything that needs action.
        Do not invent details that are not present in the emails.

        {rendered}"}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::common::{test_message, FakeGenerator, FakeReply};
    use chrono::Utc;

    fn messages(n: usize) -> Vec<email_message::Model> {
        (0..n)
            .map(|i| test_message(&format!("m{}", i), Utc::now()))
            .collect()
    }

    #[test]
    fn test_partition_completeness() {
        for (n, b) in [(0usize, 5usize), (4, 5), (5, 5), (125, 50), (7, 3)] {
            let msgs = messages(n);
            let batches = partition(&msgs, b);

            assert_eq!(batches.len(), n.div_ceil(b));
            for batch in batches.iter().take(batches.len().saturating_sub(1)) {
                assert_eq!(batch.len(), b);
            }

            let rejoined: Vec<_> = batches.into_iter().flatten().cloned().collect();
            assert_eq!(rejoined, msgs);
        }
    }

    #[test]
    fn test_partition_empty_input() {
        let batches = partition(&[], 10);
        assert!(batches.is_empty());
    }

    #[test]
    fn test_partition_is_deterministic() {
        let msgs = messages(11);
        let a: Vec<Vec<String>> = partition(&msgs, 4)
            .iter()
            .map(|b| b.iter().map(|m| m.id.clone()).collect())
            .collect();
        let b: Vec<Vec<String>> = partition(&msgs, 4)
            .iter()
            .map(|b| b.iter().map(|m| m.id.clone()).collect())
            .collect();

        assert_eq!(a, b);
    }

    #[test]
    fn test_render_message_includes_headers_and_body() {
        let mut msg = test_message("m1", Utc::now());
        msg.from = "alice@example.com".to_string();
        msg.subject = Some("Quarterly report".to_string());
        msg.body = Some("Numbers attached.".to_string());

        let block = render_message(&msg);
        assert!(block.contains("From: alice@example.com"));
        assert!(block.contains("Subject: Quarterly report"));
        assert!(block.contains("Received: "));
        assert!(block.contains("Numbers attached."));
    }

    #[tokio::test]
    async fn test_failed_batch_is_skipped() {
        let msgs = messages(9);
        let batches = partition(&msgs, 3);
        assert_eq!(batches.len(), 3);

        let generator = FakeGenerator::scripted(vec![
            FakeReply::Text("first".to_string()),
            FakeReply::Fail,
            FakeReply::Text("third".to_string()),
        ]);
        let date = Utc::now().date_naive();

        let summaries = summarize_batches(&generator, date, batches, 500).await;

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].summary, "first");
        assert_eq!(summaries[1].summary, "third");
        // Original order: the surviving batches are the first and third chunks
        assert_eq!(summaries[0].batch[0].id, "m0");
        assert_eq!(summaries[1].batch[0].id, "m6");
    }

    #[tokio::test]
    async fn test_all_batches_failing_yields_empty() {
        let msgs = messages(4);
        let batches = partition(&msgs, 2);
        let generator = FakeGenerator::scripted(vec![FakeReply::Fail, FakeReply::Fail]);

        let summaries = summarize_batches(&generator, Utc::now().date_naive(), batches, 500).await;

        assert!(summaries.is_empty());
    }
}
