use std::sync::Arc;

use entity::daily_digest;
use indoc::formatdoc;
use minijinja::render;

use crate::{
    digest::stores::DigestStore,
    email::{
        mailer::{OutgoingEmail, SendMail},
        template::DAILY_DIGEST_EMAIL_TEMPLATE,
    },
    error::{AppError, AppResult},
    server_config::cfg,
};

/// Formats a persisted digest as an email and hands it to the mail
/// collaborator, recording distribution state. Idempotent: an already
/// distributed digest is returned unchanged without another send.
pub struct DigestDistributor {
    digests: Arc<dyn DigestStore>,
    mailer: Arc<dyn SendMail>,
    recipient: Option<String>,
}

impl DigestDistributor {
    pub fn new(
        digests: Arc<dyn DigestStore>,
        mailer: Arc<dyn SendMail>,
        recipient: Option<String>,
    ) -> Self {
        Self {
            digests,
            mailer,
            recipient,
        }
    }

    pub fn from_config(digests: Arc<dyn DigestStore>, mailer: Arc<dyn SendMail>) -> Self {
        Self::new(digests, mailer, cfg.digest.recipient.clone())
    }

    pub async fn distribute(&self, digest_id: i32) -> AppResult<daily_digest::Model> {
        let digest = self
            .digests
            .find_by_id(digest_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Digest {} not found", digest_id)))?;

        if digest.is_distributed {
            tracing::info!(
                "Digest {} for {} already distributed, skipping",
                digest.id,
                digest.digest_date
            );
            return Ok(digest);
        }

        let recipient = self.recipient.clone().ok_or(AppError::MissingRecipient)?;

        let email = render_digest_email(&digest, &recipient);
        let message_id = self.mailer.send(email).await?;
        tracing::info!(
            "Digest {} for {} delivered to {} (message id {})",
            digest.id,
            digest.digest_date,
            recipient,
            message_id
        );

        let updated = self
            .digests
            .mark_distributed(digest.id, vec![recipient])
            .await?;

        Ok(updated)
    }
}

fn render_digest_email(digest: &daily_digest::Model, recipient: &str) -> OutgoingEmail {
    let digest_date = digest.digest_date.to_string();
    let email_count = digest.email_count;
    let categories = &digest.categories.0;
    let content_lines: Vec<&str> = digest
        .content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();

    let category_list = categories
        .iter()
        .map(|c| format!("- {}", c.description))
        .collect::<Vec<_>>()
        .join("\n");

    let text = formatdoc! {"
        Your email digest for {digest_date} ({email_count} emails)

        Topics:
        {category_list}

        {content}",
        content = digest.content,
    };

    let html = render!(
        DAILY_DIGEST_EMAIL_TEMPLATE,
        digest_date,
        email_count,
        categories,
        content_lines
    );

    OutgoingEmail {
        to: recipient.to_string(),
        subject: format!("Your email digest for {}", digest_date),
        html,
        text: Some(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::common::{test_digest, FakeMailer, InMemoryDigestStore};
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 7).unwrap()
    }

    fn distributor(
        digests: Arc<InMemoryDigestStore>,
        mailer: Arc<FakeMailer>,
        recipient: Option<&str>,
    ) -> DigestDistributor {
        DigestDistributor::new(digests, mailer, recipient.map(str::to_string))
    }

    #[tokio::test]
    async fn test_distribute_sends_and_marks() {
        let digests = Arc::new(InMemoryDigestStore::default());
        let digest = digests.insert_model(date(), "digest body").await;
        let mailer = Arc::new(FakeMailer::default());

        let dist = distributor(digests.clone(), mailer.clone(), Some("me@example.com"));
        let updated = dist.distribute(digest.id).await.unwrap();

        assert!(updated.is_distributed);
        assert!(updated.distributed_at.is_some());
        assert_eq!(updated.distributed_to, vec!["me@example.com"]);

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "me@example.com");
        assert!(sent[0].subject.contains("2024-10-07"));
        assert!(sent[0].html.contains("digest body"));
    }

    #[tokio::test]
    async fn test_distribute_twice_sends_once() {
        let digests = Arc::new(InMemoryDigestStore::default());
        let digest = digests.insert_model(date(), "digest body").await;
        let mailer = Arc::new(FakeMailer::default());

        let dist = distributor(digests.clone(), mailer.clone(), Some("me@example.com"));
        let first = dist.distribute(digest.id).await.unwrap();
        let second = dist.distribute(digest.id).await.unwrap();

        assert_eq!(second, first);
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_recipient_is_configuration_error() {
        let digests = Arc::new(InMemoryDigestStore::default());
        let digest = digests.insert_model(date(), "digest body").await;
        let mailer = Arc::new(FakeMailer::default());

        let dist = distributor(digests.clone(), mailer.clone(), None);
        let result = dist.distribute(digest.id).await;

        assert!(matches!(result, Err(AppError::MissingRecipient)));
        assert!(mailer.sent().is_empty());
        let unchanged = digests.find_by_id(digest.id).await.unwrap().unwrap();
        assert!(!unchanged.is_distributed);
    }

    #[tokio::test]
    async fn test_unknown_digest_is_not_found() {
        let digests = Arc::new(InMemoryDigestStore::default());
        let mailer = Arc::new(FakeMailer::default());

        let dist = distributor(digests, mailer, Some("me@example.com"));
        let result = dist.distribute(42).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delivery_failure_leaves_state_unchanged() {
        let digests = Arc::new(InMemoryDigestStore::default());
        let digest = digests.insert_model(date(), "digest body").await;
        let mailer = Arc::new(FakeMailer::failing());

        let dist = distributor(digests.clone(), mailer.clone(), Some("me@example.com"));
        let result = dist.distribute(digest.id).await;

        assert!(result.is_err());
        let unchanged = digests.find_by_id(digest.id).await.unwrap().unwrap();
        assert!(!unchanged.is_distributed);
        assert!(unchanged.distributed_to.is_empty());
    }

    #[test]
    fn test_render_digest_email() {
        let mut digest = test_digest(date(), "First paragraph\n\nSecond paragraph");
        digest.email_count = 12;
        digest.categories = entity::daily_digest::TopicCategories(vec![
            entity::daily_digest::TopicCategory {
                name: "Work".to_string(),
                description: "Work: meetings and deadlines".to_string(),
            },
        ]);

        let email = render_digest_email(&digest, "me@example.com");

        assert_eq!(email.to, "me@example.com");
        assert_eq!(email.subject, "Your email digest for 2024-10-07");

        let text = email.text.unwrap();
        assert!(text.contains("(12 emails)"));
        assert!(text.contains("- Work: meetings and deadlines"));
        assert!(text.contains("First paragraph"));

        assert!(email.html.contains("Work: meetings and deadlines"));
        assert!(email.html.contains("<p>First paragraph</p>"));
        assert!(email.html.contains("<p>Second paragraph</p>"));
    }
}
