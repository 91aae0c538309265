//! In-memory collaborators for pipeline and scheduler tests.

use crate::ai::{AiError, LanguageModel};
use crate::db::ReplyStore;
use crate::models::{ConversationTweet, Mention, PostedReply, ReplyRecord};
use crate::social::SocialClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// One call to `post_reply`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostCall {
    pub id: String,
    pub text: String,
    pub in_reply_to: String,
}

/// Social client backed by maps. Posted reply ids count up from 99.
pub struct MockSocialClient {
    self_id: String,
    mentions: Mutex<Vec<Mention>>,
    tweets: Mutex<HashMap<String, ConversationTweet>>,
    failing_posts: Mutex<HashSet<String>>,
    fail_mentions: AtomicBool,
    next_post_id: AtomicU64,
    posted: Mutex<Vec<PostCall>>,
    mention_queries: Mutex<Vec<DateTime<Utc>>>,
}

impl MockSocialClient {
    pub fn new() -> Self {
        Self {
            self_id: "1000".to_string(),
            mentions: Mutex::new(Vec::new()),
            tweets: Mutex::new(HashMap::new()),
            failing_posts: Mutex::new(HashSet::new()),
            fail_mentions: AtomicBool::new(false),
            next_post_id: AtomicU64::new(99),
            posted: Mutex::new(Vec::new()),
            mention_queries: Mutex::new(Vec::new()),
        }
    }

    pub fn add_mention(&self, mention: Mention) {
        self.mentions.lock().push(mention);
    }

    pub fn add_tweet(&self, tweet: ConversationTweet) {
        self.tweets.lock().insert(tweet.id.clone(), tweet);
    }

    /// Posting a reply to `mention_id` will fail
    pub fn fail_post_to(&self, mention_id: &str) {
        self.failing_posts.lock().insert(mention_id.to_string());
    }

    pub fn fail_mention_fetch(&self) {
        self.fail_mentions.store(true, Ordering::SeqCst);
    }

    pub fn posted(&self) -> Vec<PostCall> {
        self.posted.lock().clone()
    }

    /// `since` of every mention query, in call order
    pub fn mention_queries(&self) -> Vec<DateTime<Utc>> {
        self.mention_queries.lock().clone()
    }
}

#[async_trait]
impl SocialClient for MockSocialClient {
    async fn get_self_id(&self) -> Result<String, String> {
        Ok(self.self_id.clone())
    }

    async fn get_recent_mentions(
        &self,
        _user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Mention>, String> {
        self.mention_queries.lock().push(since);
        if self.fail_mentions.load(Ordering::SeqCst) {
            return Err("Twitter API error (503 Service Unavailable): over capacity".to_string());
        }
        Ok(self.mentions.lock().clone())
    }

    async fn get_tweet(&self, id: &str) -> Result<ConversationTweet, String> {
        self.tweets
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| format!("Twitter API error (404 Not Found): no tweet {}", id))
    }

    async fn post_reply(&self, text: &str, in_reply_to_id: &str) -> Result<PostedReply, String> {
        if self.failing_posts.lock().contains(in_reply_to_id) {
            return Err("Twitter API error (403 Forbidden): duplicate content".to_string());
        }

        let id = self.next_post_id.fetch_add(1, Ordering::SeqCst).to_string();
        self.posted.lock().push(PostCall {
            id: id.clone(),
            text: text.to_string(),
            in_reply_to: in_reply_to_id.to_string(),
        });
        Ok(PostedReply { id })
    }
}

/// Answers from a queue, then with a fixed fallback once the queue is empty
pub struct MockLanguageModel {
    replies: Mutex<VecDeque<Result<String, AiError>>>,
    fallback: String,
    prompts: Mutex<Vec<String>>,
}

impl MockLanguageModel {
    pub fn always(reply: &str) -> Self {
        Self::with_replies(Vec::new(), reply)
    }

    pub fn with_replies(replies: Vec<Result<String, AiError>>, fallback: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from(replies)),
            fallback: fallback.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// User text of every completion request
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn complete(&self, _system_prompt: &str, user_text: &str) -> Result<String, AiError> {
        self.prompts.lock().push(user_text.to_string());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// Vec-backed reply store with switchable failures
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<ReplyRecord>>,
    scans: AtomicUsize,
    fail_query: AtomicBool,
    fail_append: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<ReplyRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<ReplyRecord> {
        self.records.lock().clone()
    }

    /// Number of full `query_all` scans served
    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    pub fn fail_queries(&self) {
        self.fail_query.store(true, Ordering::SeqCst);
    }

    pub fn fail_appends(&self) {
        self.fail_append.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReplyStore for MemoryStore {
    async fn query_all(&self) -> Result<Vec<ReplyRecord>, String> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        if self.fail_query.load(Ordering::SeqCst) {
            return Err("Airtable API error (503 Service Unavailable): down".to_string());
        }
        Ok(self.records.lock().clone())
    }

    async fn append(&self, record: &ReplyRecord) -> Result<(), String> {
        if self.fail_append.load(Ordering::SeqCst) {
            return Err("Airtable API error (422 Unprocessable Entity): INVALID_VALUE".to_string());
        }
        self.records.lock().push(record.clone());
        Ok(())
    }
}
