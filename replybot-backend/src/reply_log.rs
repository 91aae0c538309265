//! "Have we already answered this conversation?"
//!
//! Wraps a [`ReplyStore`] with an id set that is loaded from the store once
//! per run, on the first check, and kept current by [`ResponseLog::record`].
//! Conversations answered during the run count as answered until the run
//! ends, whether or not their record reached the store.

use crate::db::ReplyStore;
use crate::models::ReplyRecord;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Default)]
struct RunCache {
    /// Ids read from the store; `None` until the first check of the run
    stored: Option<HashSet<String>>,
    /// Ids answered during this run
    answered: HashSet<String>,
}

pub struct ResponseLog {
    store: Arc<dyn ReplyStore>,
    cache: Mutex<RunCache>,
}

impl ResponseLog {
    pub fn new(store: Arc<dyn ReplyStore>) -> Self {
        Self {
            store,
            cache: Mutex::new(RunCache::default()),
        }
    }

    /// Drop the cached ids so the next check re-reads the store
    pub fn begin_run(&self) {
        *self.cache.lock() = RunCache::default();
    }

    pub async fn has_responded(&self, conversation_tweet_id: &str) -> Result<bool, String> {
        let cached = {
            let cache = self.cache.lock();
            if cache.answered.contains(conversation_tweet_id) {
                Some(true)
            } else {
                cache
                    .stored
                    .as_ref()
                    .map(|ids| ids.contains(conversation_tweet_id))
            }
        };
        if let Some(answered) = cached {
            return Ok(answered);
        }

        let records = self.store.query_all().await?;
        let ids: HashSet<String> = records
            .into_iter()
            .map(|r| r.mentioned_conversation_tweet_id)
            .filter(|id| !id.is_empty())
            .collect();
        log::debug!("Reply log: loaded {} answered conversation id(s)", ids.len());

        let answered = ids.contains(conversation_tweet_id);
        self.cache.lock().stored = Some(ids);
        Ok(answered)
    }

    /// Append one record. Rows are never updated or removed.
    ///
    /// The conversation is marked answered for the rest of the run even when
    /// the append fails: the reply is already live.
    pub async fn record(&self, entry: &ReplyRecord) -> Result<(), String> {
        self.cache
            .lock()
            .answered
            .insert(entry.mentioned_conversation_tweet_id.clone());
        self.store.append(entry).await
    }
}
