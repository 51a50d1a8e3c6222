use chrono::NaiveDate;
use entity::daily_digest::TopicCategory;
use entity::email_message;
use indoc::formatdoc;

use crate::prompt::{Generate, GenerateOptions};

const CATEGORY_MAX_TOKENS: u32 = 400;

/// Derive topic categories for the full day's message set with one
/// classification prompt. Only subject and sender go into the prompt to keep
/// it bounded. A backend failure degrades to an empty list; the digest run
/// continues without categories.
pub async fn categorize(
    generator: &dyn Generate,
    date: NaiveDate,
    messages: &[email_message::Model],
) -> Vec<TopicCategory> {
    let prompt = categorization_prompt(messages);
    let options = GenerateOptions {
        max_tokens: Some(CATEGORY_MAX_TOKENS),
        ..Default::default()
    };

    match generator.generate(&prompt, options).await {
        Ok(text) => parse_categories(&text),
        Err(e) => {
            tracing::warn!(
                "Categorization for digest {} failed, continuing without categories: {:?}",
                date,
                e
            );
            Vec::new()
        }
    }
}

fn categorization_prompt(messages: &[email_message::Model]) -> String {
    let lines = messages
        .iter()
        .map(|msg| {
            format!(
                "From: {} | Subject: {}",
                msg.from,
                msg.subject.as_deref().unwrap_or("(no subject)")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    formatdoc! {"
        Group the emails below into 3 to 7 topic categories.
        Respond with one category per line in the form \"Name: short description\".
        Do not add any other text before or after the list.

        {lines}"}
}

/// Best-effort parser for the model's free-text category list. Each non-blank
/// line becomes one category: the text before the first `:` is the name and
/// the whole line the description; lines without a separator serve as both.
pub fn parse_categories(text: &str) -> Vec<TopicCategory> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let name = match line.split_once(':') {
                Some((name, _)) => name.trim(),
                None => line,
            };

            TopicCategory {
                name: name.to_string(),
                description: line.to_string(),
            }
        })
        .collect()
}
