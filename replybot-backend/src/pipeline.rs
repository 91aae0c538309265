//! Mention triage: fetch, resolve, dedup, generate, post, record.

use crate::models::{Mention, ReplyRecord, RunStats};
use crate::reply_log::ResponseLog;
use crate::resolver::{is_root_mention, MentionResolver};
use crate::responder::{ResponseGenerator, FALLBACK_REPLY};
use crate::social::SocialClient;
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Knobs for a single run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Id of the bot account whose mentions are triaged
    pub bot_user_id: String,
    /// How far back each run looks for mentions. Must comfortably exceed the
    /// run interval so a delayed run still sees everything.
    pub lookback: Duration,
    /// Maximum mentions processed per run
    pub tweet_response_limit: usize,
}

impl PipelineConfig {
    pub fn new(bot_user_id: impl Into<String>) -> Self {
        Self {
            bot_user_id: bot_user_id.into(),
            lookback: Duration::minutes(crate::config::defaults::MENTION_LOOKBACK_MINUTES),
            tweet_response_limit: crate::config::defaults::TWEET_RESPONSE_LIMIT,
        }
    }
}

/// What happened to one mention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MentionOutcome {
    Replied,
    Failed,
    Skipped,
}

pub struct TriagePipeline {
    social: Arc<dyn SocialClient>,
    resolver: MentionResolver,
    reply_log: ResponseLog,
    generator: ResponseGenerator,
    config: PipelineConfig,
}

impl TriagePipeline {
    pub fn new(
        social: Arc<dyn SocialClient>,
        reply_log: ResponseLog,
        generator: ResponseGenerator,
        config: PipelineConfig,
    ) -> Self {
        Self {
            resolver: MentionResolver::new(social.clone()),
            social,
            reply_log,
            generator,
            config,
        }
    }

    /// Execute one full triage run.
    ///
    /// Per-mention failures (generation, posting) are counted in the returned
    /// stats. Failing to fetch mentions or to read the reply log aborts the
    /// run with `Err`.
    pub async fn run(&self) -> Result<RunStats, String> {
        let mut stats = RunStats::default();
        self.reply_log.begin_run();

        let since = Utc::now() - self.config.lookback;
        let mentions = self
            .social
            .get_recent_mentions(&self.config.bot_user_id, since)
            .await
            .map_err(|e| format!("Failed to fetch mentions: {}", e))?;

        if mentions.is_empty() {
            log::info!("No mentions found.");
            return Ok(stats);
        }

        stats.mentions_found = mentions.len();
        if mentions.len() > self.config.tweet_response_limit {
            log::info!(
                "Found {} mentions, processing the first {}",
                mentions.len(),
                self.config.tweet_response_limit
            );
        }

        for mention in mentions.iter().take(self.config.tweet_response_limit) {
            match self.process_mention(mention).await? {
                MentionOutcome::Replied => stats.mentions_replied += 1,
                MentionOutcome::Failed => stats.mentions_replied_errors += 1,
                MentionOutcome::Skipped => {}
            }
        }

        Ok(stats)
    }

    /// `Err` only for failures that should abort the whole run
    async fn process_mention(&self, mention: &Mention) -> Result<MentionOutcome, String> {
        let conversation = match self.resolver.resolve(mention).await {
            Ok(Some(conversation)) => conversation,
            Ok(None) => {
                log::debug!("Mention {} has no conversation id, skipping", mention.id);
                return Ok(MentionOutcome::Skipped);
            }
            Err(e) => {
                log::warn!(
                    "Failed to resolve conversation for mention {}: {}",
                    mention.id,
                    e
                );
                return Ok(MentionOutcome::Skipped);
            }
        };

        // Root mentions are not checked against the log; only replies inside
        // someone else's conversation are deduplicated.
        if !is_root_mention(mention, &conversation)
            && self
                .reply_log
                .has_responded(&conversation.id)
                .await
                .map_err(|e| format!("Failed to read reply log: {}", e))?
        {
            log::debug!(
                "Already replied to conversation {}, skipping mention {}",
                conversation.id,
                mention.id
            );
            return Ok(MentionOutcome::Skipped);
        }

        let response_text = match self.generator.generate(&conversation.text).await {
            Ok(text) => text,
            Err(e) => {
                log::error!("Failed to generate reply for mention {}: {}", mention.id, e);
                return Ok(MentionOutcome::Failed);
            }
        };
        if response_text.trim() == FALLBACK_REPLY {
            log::debug!("Conversation {} gave the model too little context", conversation.id);
        }

        let posted = match self.social.post_reply(&response_text, &mention.id).await {
            Ok(posted) => posted,
            Err(e) => {
                log::error!("Failed to post reply to mention {}: {}", mention.id, e);
                return Ok(MentionOutcome::Failed);
            }
        };

        let record =
            ReplyRecord::for_reply(mention, &conversation, &posted.id, &response_text, Utc::now());
        if let Err(e) = self.reply_log.record(&record).await {
            // The reply is live; without a record a later run may answer this conversation again
            log::error!(
                "Posted reply {} for conversation {} but failed to record it: {}",
                posted.id,
                conversation.id,
                e
            );
        }

        Ok(MentionOutcome::Replied)
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod pipeline_tests;
