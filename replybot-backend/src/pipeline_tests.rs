//! End-to-end runs of the triage pipeline over in-memory collaborators.
//!
//! These cover the run-level guarantees: one reply per conversation across
//! runs, root mentions always answered, the per-run cap, and per-mention
//! failure isolation.

use super::{PipelineConfig, TriagePipeline};
use crate::ai::AiError;
use crate::models::{ConversationTweet, Mention, ReplyRecord, RunStats};
use crate::reply_log::ResponseLog;
use crate::responder::ResponseGenerator;
use crate::testing::{MemoryStore, MockLanguageModel, MockSocialClient};
use chrono::{Duration, Utc};
use std::sync::Arc;

const REPLY_TEXT: &str = "Decentralization isn't a phase — it's the endgame.";

/// Wires a pipeline to mock collaborators that stay inspectable after runs
struct TestHarness {
    social: Arc<MockSocialClient>,
    model: Arc<MockLanguageModel>,
    store: Arc<MemoryStore>,
    pipeline: TriagePipeline,
}

impl TestHarness {
    fn new(social: MockSocialClient, model: MockLanguageModel, store: MemoryStore) -> Self {
        Self::with_limit(social, model, store, 35)
    }

    fn with_limit(
        social: MockSocialClient,
        model: MockLanguageModel,
        store: MemoryStore,
        limit: usize,
    ) -> Self {
        let social = Arc::new(social);
        let model = Arc::new(model);
        let store = Arc::new(store);
        let pipeline = build_pipeline(&social, &model, &store, limit);

        TestHarness {
            social,
            model,
            store,
            pipeline,
        }
    }

    /// A second pipeline over the same collaborators, as after a process restart
    fn restarted(&self) -> TriagePipeline {
        build_pipeline(&self.social, &self.model, &self.store, 35)
    }
}

fn build_pipeline(
    social: &Arc<MockSocialClient>,
    model: &Arc<MockLanguageModel>,
    store: &Arc<MemoryStore>,
    limit: usize,
) -> TriagePipeline {
    let mut config = PipelineConfig::new("1000");
    config.tweet_response_limit = limit;

    TriagePipeline::new(
        social.clone(),
        ResponseLog::new(store.clone()),
        ResponseGenerator::new(model.clone()),
        config,
    )
}

/// A reply mention `id` inside conversation `conversation_id`, with the root tweet registered
fn add_reply_mention(social: &MockSocialClient, id: &str, conversation_id: &str, text: &str) {
    social.add_tweet(ConversationTweet::new(conversation_id, text));
    social.add_mention(Mention::new(id, Some(conversation_id)));
}

fn stats(found: usize, replied: usize, errors: usize) -> RunStats {
    RunStats {
        mentions_found: found,
        mentions_replied: replied,
        mentions_replied_errors: errors,
    }
}

#[tokio::test]
async fn test_single_mention_end_to_end() {
    let social = MockSocialClient::new();
    add_reply_mention(&social, "10", "5", "DAOs are overrated");
    let h = TestHarness::new(social, MockLanguageModel::always(REPLY_TEXT), MemoryStore::new());

    let result = h.pipeline.run().await.unwrap();

    assert_eq!(result, stats(1, 1, 0));
    assert_eq!(h.model.prompts(), vec!["DAOs are overrated".to_string()]);

    let posted = h.social.posted();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].id, "99");
    assert_eq!(posted[0].text, REPLY_TEXT);
    // Threaded under the mention, not the conversation root
    assert_eq!(posted[0].in_reply_to, "10");

    let records = h.store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].mentioned_conversation_tweet_id, "5");
    assert_eq!(records[0].mentioned_conversation_tweet_text, "DAOs are overrated");
    assert_eq!(records[0].tweet_response_id, "99");
    assert_eq!(records[0].tweet_response_text, REPLY_TEXT);
    assert!(!records[0].tweet_response_created_at.is_empty());
}

#[tokio::test]
async fn test_second_run_does_not_reply_again() {
    let social = MockSocialClient::new();
    add_reply_mention(&social, "10", "5", "DAOs are overrated");
    let h = TestHarness::new(social, MockLanguageModel::always(REPLY_TEXT), MemoryStore::new());

    assert_eq!(h.pipeline.run().await.unwrap(), stats(1, 1, 0));
    assert_eq!(h.pipeline.run().await.unwrap(), stats(1, 0, 0));

    assert_eq!(h.social.posted().len(), 1);
    assert_eq!(h.store.records().len(), 1);
    assert_eq!(h.model.prompts().len(), 1);
}

#[tokio::test]
async fn test_reply_log_survives_restart() {
    let social = MockSocialClient::new();
    add_reply_mention(&social, "10", "5", "DAOs are overrated");
    let h = TestHarness::new(social, MockLanguageModel::always(REPLY_TEXT), MemoryStore::new());

    h.pipeline.run().await.unwrap();
    let result = h.restarted().run().await.unwrap();

    assert_eq!(result, stats(1, 0, 0));
    assert_eq!(h.social.posted().len(), 1);
}

#[tokio::test]
async fn test_existing_record_blocks_reply() {
    let social = MockSocialClient::new();
    add_reply_mention(&social, "10", "5", "DAOs are overrated");
    let store = MemoryStore::with_records(vec![ReplyRecord {
        mentioned_conversation_tweet_id: "5".to_string(),
        tweet_response_id: "42".to_string(),
        ..Default::default()
    }]);
    let h = TestHarness::new(social, MockLanguageModel::always(REPLY_TEXT), store);

    assert_eq!(h.pipeline.run().await.unwrap(), stats(1, 0, 0));
    assert!(h.social.posted().is_empty());
    assert!(h.model.prompts().is_empty());
}

#[tokio::test]
async fn test_two_mentions_in_one_conversation_get_one_reply() {
    let social = MockSocialClient::new();
    add_reply_mention(&social, "10", "5", "DAOs are overrated");
    social.add_mention(Mention::new("11", Some("5")));
    let h = TestHarness::new(social, MockLanguageModel::always(REPLY_TEXT), MemoryStore::new());

    assert_eq!(h.pipeline.run().await.unwrap(), stats(2, 1, 0));
    assert_eq!(h.social.posted().len(), 1);
    assert_eq!(h.social.posted()[0].in_reply_to, "10");
    // The log is read once per run; the new record is tracked in memory
    assert_eq!(h.store.scans(), 1);
}

#[tokio::test]
async fn test_root_mention_always_answered() {
    let social = MockSocialClient::new();
    // The mention is the conversation root
    add_reply_mention(&social, "5", "5", "gm, what is next for DeFi?");
    let store = MemoryStore::with_records(vec![ReplyRecord {
        mentioned_conversation_tweet_id: "5".to_string(),
        ..Default::default()
    }]);
    let h = TestHarness::new(social, MockLanguageModel::always(REPLY_TEXT), store);

    assert_eq!(h.pipeline.run().await.unwrap(), stats(1, 1, 0));
    assert_eq!(h.pipeline.run().await.unwrap(), stats(1, 1, 0));

    let posted = h.social.posted();
    assert_eq!(posted.len(), 2);
    assert!(posted.iter().all(|p| p.in_reply_to == "5"));
    // Root mentions never consult the log
    assert_eq!(h.store.scans(), 0);
    assert_eq!(h.store.records().len(), 3);
}

#[tokio::test]
async fn test_run_caps_processed_mentions() {
    let social = MockSocialClient::new();
    for i in 0..50 {
        add_reply_mention(&social, &format!("m{}", i), &format!("c{}", i), "hot take");
    }
    let h = TestHarness::with_limit(
        social,
        MockLanguageModel::always(REPLY_TEXT),
        MemoryStore::new(),
        35,
    );

    let result = h.pipeline.run().await.unwrap();

    assert_eq!(result, stats(50, 35, 0));
    let posted = h.social.posted();
    assert_eq!(posted.len(), 35);
    // The first 35 in API order
    assert_eq!(posted[0].in_reply_to, "m0");
    assert_eq!(posted[34].in_reply_to, "m34");
}

#[tokio::test]
async fn test_post_failure_is_isolated() {
    let social = MockSocialClient::new();
    add_reply_mention(&social, "m1", "c1", "one");
    add_reply_mention(&social, "m2", "c2", "two");
    add_reply_mention(&social, "m3", "c3", "three");
    social.fail_post_to("m2");
    let h = TestHarness::new(social, MockLanguageModel::always(REPLY_TEXT), MemoryStore::new());

    assert_eq!(h.pipeline.run().await.unwrap(), stats(3, 2, 1));

    let answered: Vec<String> = h
        .store
        .records()
        .into_iter()
        .map(|r| r.mentioned_conversation_tweet_id)
        .collect();
    assert_eq!(answered, vec!["c1".to_string(), "c3".to_string()]);
}

#[tokio::test]
async fn test_failed_post_is_retried_next_run() {
    let social = MockSocialClient::new();
    add_reply_mention(&social, "m1", "c1", "one");
    social.fail_post_to("m1");
    let h = TestHarness::new(social, MockLanguageModel::always(REPLY_TEXT), MemoryStore::new());

    assert_eq!(h.pipeline.run().await.unwrap(), stats(1, 0, 1));
    // Nothing was recorded, so the next run generates again
    assert_eq!(h.pipeline.run().await.unwrap(), stats(1, 0, 1));
    assert_eq!(h.model.prompts().len(), 2);
}

#[tokio::test]
async fn test_generation_failure_is_isolated() {
    let social = MockSocialClient::new();
    add_reply_mention(&social, "m1", "c1", "one");
    add_reply_mention(&social, "m2", "c2", "two");
    let model = MockLanguageModel::with_replies(
        vec![Err(AiError::with_status("quota exhausted", 429))],
        REPLY_TEXT,
    );
    let h = TestHarness::new(social, model, MemoryStore::new());

    assert_eq!(h.pipeline.run().await.unwrap(), stats(2, 1, 1));

    let posted = h.social.posted();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].in_reply_to, "m2");
}

#[tokio::test]
async fn test_empty_window_does_no_work() {
    let h = TestHarness::new(
        MockSocialClient::new(),
        MockLanguageModel::always(REPLY_TEXT),
        MemoryStore::new(),
    );

    assert_eq!(h.pipeline.run().await.unwrap(), RunStats::default());
    assert_eq!(h.store.scans(), 0);
    assert!(h.model.prompts().is_empty());
    assert!(h.social.posted().is_empty());
}

#[tokio::test]
async fn test_unresolvable_mentions_are_skipped() {
    let social = MockSocialClient::new();
    // No conversation id at all
    social.add_mention(Mention::new("m1", None));
    // Conversation root cannot be fetched (deleted or protected)
    social.add_mention(Mention::new("m2", Some("gone")));
    let h = TestHarness::new(social, MockLanguageModel::always(REPLY_TEXT), MemoryStore::new());

    assert_eq!(h.pipeline.run().await.unwrap(), stats(2, 0, 0));
    assert!(h.model.prompts().is_empty());
    assert!(h.social.posted().is_empty());
}

#[tokio::test]
async fn test_mention_fetch_failure_aborts_run() {
    let social = MockSocialClient::new();
    add_reply_mention(&social, "10", "5", "DAOs are overrated");
    social.fail_mention_fetch();
    let h = TestHarness::new(social, MockLanguageModel::always(REPLY_TEXT), MemoryStore::new());

    let err = h.pipeline.run().await.unwrap_err();
    assert!(err.starts_with("Failed to fetch mentions"), "{}", err);
    assert!(h.model.prompts().is_empty());
}

#[tokio::test]
async fn test_reply_log_failure_aborts_run() {
    let social = MockSocialClient::new();
    add_reply_mention(&social, "10", "5", "DAOs are overrated");
    let store = MemoryStore::new();
    store.fail_queries();
    let h = TestHarness::new(social, MockLanguageModel::always(REPLY_TEXT), store);

    let err = h.pipeline.run().await.unwrap_err();
    assert!(err.starts_with("Failed to read reply log"), "{}", err);
    // Unknown history means no reply
    assert!(h.social.posted().is_empty());
}

#[tokio::test]
async fn test_record_failure_still_counts_as_replied() {
    let social = MockSocialClient::new();
    add_reply_mention(&social, "10", "5", "DAOs are overrated");
    let store = MemoryStore::new();
    store.fail_appends();
    let h = TestHarness::new(social, MockLanguageModel::always(REPLY_TEXT), store);

    assert_eq!(h.pipeline.run().await.unwrap(), stats(1, 1, 0));
    assert_eq!(h.social.posted().len(), 1);
    assert!(h.store.records().is_empty());
}

#[tokio::test]
async fn test_record_failure_does_not_double_reply_in_run() {
    let social = MockSocialClient::new();
    add_reply_mention(&social, "10", "5", "DAOs are overrated");
    social.add_mention(Mention::new("11", Some("5")));
    let store = MemoryStore::new();
    store.fail_appends();
    let h = TestHarness::new(social, MockLanguageModel::always(REPLY_TEXT), store);

    assert_eq!(h.pipeline.run().await.unwrap(), stats(2, 1, 0));

    let posted = h.social.posted();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].in_reply_to, "10");
    assert_eq!(h.model.prompts().len(), 1);
}

#[tokio::test]
async fn test_mentions_queried_over_lookback_window() {
    let h = TestHarness::new(
        MockSocialClient::new(),
        MockLanguageModel::always(REPLY_TEXT),
        MemoryStore::new(),
    );

    let before = Utc::now();
    h.pipeline.run().await.unwrap();
    let after = Utc::now();

    let queries = h.social.mention_queries();
    assert_eq!(queries.len(), 1);
    assert!(queries[0] >= before - Duration::minutes(20));
    assert!(queries[0] <= after - Duration::minutes(20));
}
