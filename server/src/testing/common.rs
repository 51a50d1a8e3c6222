//! In-memory fakes and fixture builders shared by the unit tests.

use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering},
    Mutex,
};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use entity::{
    daily_digest,
    daily_digest::TopicCategories,
    email_message,
    email_message::Attachments,
};

use crate::{
    digest::stores::{DigestStore, MessageStore, NewDigest},
    email::mailer::{OutgoingEmail, SendMail},
    error::{AppError, AppResult},
    prompt::{Generate, GenerateOptions},
};

pub fn test_message(id: &str, received_at: DateTime<Utc>) -> email_message::Model {
    email_message::Model {
        id: id.to_string(),
        thread_id: format!("t-{}", id),
        from: "sender@example.com".to_string(),
        to: vec!["me@example.com".to_string()],
        subject: Some(format!("Subject {}", id)),
        body: Some(format!("Body of {}", id)),
        html_body: None,
        received_at,
        labels: vec!["INBOX".to_string()],
        attachments: Attachments::default(),
        is_processed: false,
        is_summarized: false,
        metadata: None,
    }
}

pub fn test_digest(date: NaiveDate, content: &str) -> daily_digest::Model {
    daily_digest::Model {
        id: 1,
        digest_date: date,
        content: content.to_string(),
        categories: TopicCategories::default(),
        email_count: 0,
        email_ids: vec![],
        is_distributed: false,
        distributed_at: None,
        distributed_to: vec![],
        metadata: None,
    }
}

pub enum FakeReply {
    Text(String),
    Fail,
}

/// Generation backend fake. Either replays a script in call order or always
/// returns the same text; records every prompt it sees.
pub struct FakeGenerator {
    replies: Mutex<VecDeque<FakeReply>>,
    fallback: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn scripted(replies: Vec<FakeReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn always(text: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Some(text.to_string()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generate for FakeGenerator {
    async fn generate(&self, prompt: &str, _options: GenerateOptions) -> AppResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(FakeReply::Text(text)) => Ok(text),
            Some(FakeReply::Fail) => Err(AppError::Provider {
                status: 500,
                message: "scripted provider failure".to_string(),
            }),
            None => match &self.fallback {
                Some(text) => Ok(text.clone()),
                None => Err(AppError::Provider {
                    status: 500,
                    message: "no scripted reply left".to_string(),
                }),
            },
        }
    }
}

#[derive(Default)]
pub struct InMemoryMessageStore {
    messages: Mutex<Vec<email_message::Model>>,
    mark_calls: AtomicUsize,
    fail_mark: AtomicBool,
}

impl InMemoryMessageStore {
    pub fn with_messages(messages: Vec<email_message::Model>) -> Self {
        Self {
            messages: Mutex::new(messages),
            ..Default::default()
        }
    }

    pub fn fail_marking(&self) {
        self.fail_mark.store(true, Ordering::SeqCst);
    }

    pub fn mark_call_count(&self) -> usize {
        self.mark_calls.load(Ordering::SeqCst)
    }

    /// Ids of messages currently flagged summarized, in insertion order.
    pub fn summarized_ids(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.is_summarized)
            .map(|m| m.id.clone())
            .collect()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn find_unsummarized(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<email_message::Model>> {
        let mut found: Vec<email_message::Model> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| !m.is_summarized && m.received_at >= start && m.received_at <= end)
            .cloned()
            .collect();
        found.sort_by_key(|m| m.received_at);

        Ok(found)
    }

    async fn mark_summarized(&self, ids: &[String]) -> AppResult<u64> {
        self.mark_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_mark.load(Ordering::SeqCst) {
            return Err(AppError::Internal(anyhow!("scripted store failure")));
        }

        let mut count = 0;
        let mut messages = self.messages.lock().unwrap();
        for message in messages.iter_mut() {
            if ids.contains(&message.id) && !message.is_summarized {
                message.is_summarized = true;
                count += 1;
            }
        }

        Ok(count)
    }
}

#[derive(Default)]
pub struct InMemoryDigestStore {
    digests: Mutex<Vec<daily_digest::Model>>,
    next_id: AtomicI32,
    inserts: AtomicUsize,
    hide_next_find: AtomicBool,
}

impl InMemoryDigestStore {
    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    /// Makes the next `find_by_date` return nothing even if a digest exists,
    /// simulating a concurrent run winning the insert race.
    pub fn hide_from_next_find_by_date(&self) {
        self.hide_next_find.store(true, Ordering::SeqCst);
    }

    /// Seeds a digest directly, bypassing the insert counter.
    pub async fn insert_model(&self, date: NaiveDate, content: &str) -> daily_digest::Model {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let digest = daily_digest::Model {
            id,
            ..test_digest(date, content)
        };
        self.digests.lock().unwrap().push(digest.clone());

        digest
    }
}

#[async_trait]
impl DigestStore for InMemoryDigestStore {
    async fn find_by_date(&self, date: NaiveDate) -> AppResult<Option<daily_digest::Model>> {
        if self.hide_next_find.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }

        Ok(self
            .digests
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.digest_date == date)
            .cloned())
    }

    async fn insert(&self, digest: NewDigest) -> AppResult<daily_digest::Model> {
        self.inserts.fetch_add(1, Ordering::SeqCst);

        let mut digests = self.digests.lock().unwrap();
        if digests.iter().any(|d| d.digest_date == digest.digest_date) {
            return Err(AppError::Conflict(format!(
                "Digest for {} already exists",
                digest.digest_date
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let model = daily_digest::Model {
            id,
            digest_date: digest.digest_date,
            content: digest.content,
            categories: digest.categories,
            email_count: digest.email_count,
            email_ids: digest.email_ids,
            is_distributed: false,
            distributed_at: None,
            distributed_to: vec![],
            metadata: None,
        };
        digests.push(model.clone());

        Ok(model)
    }

    async fn find_by_id(&self, id: i32) -> AppResult<Option<daily_digest::Model>> {
        Ok(self
            .digests
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == id)
            .cloned())
    }

    async fn mark_distributed(
        &self,
        id: i32,
        recipients: Vec<String>,
    ) -> AppResult<daily_digest::Model> {
        let mut digests = self.digests.lock().unwrap();
        let digest = digests
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Digest {} not found", id)))?;

        digest.is_distributed = true;
        digest.distributed_at = Some(Utc::now());
        digest.distributed_to = recipients;

        Ok(digest.clone())
    }
}

#[derive(Default)]
pub struct FakeMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    fail: AtomicBool,
}

impl FakeMailer {
    pub fn failing() -> Self {
        let mailer = Self::default();
        mailer.fail.store(true, Ordering::SeqCst);
        mailer
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SendMail for FakeMailer {
    async fn send(&self, email: OutgoingEmail) -> AppResult<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Internal(anyhow!("scripted delivery failure")));
        }

        let mut sent = self.sent.lock().unwrap();
        sent.push(email);

        Ok(format!("fake-message-{}", sent.len()))
    }
}
