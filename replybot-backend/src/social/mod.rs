//! Social network boundary: what the triage pipeline needs from the platform.

pub mod oauth;
pub mod twitter;

pub use oauth::TwitterCredentials;
pub use twitter::TwitterClient;

use crate::models::{ConversationTweet, Mention, PostedReply};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Client for the social network the bot lives on.
///
/// Implementations wait out ordinary rate limiting themselves instead of
/// surfacing it as an error.
#[async_trait]
pub trait SocialClient: Send + Sync {
    /// Id of the authenticated (bot) account
    async fn get_self_id(&self) -> Result<String, String>;

    /// Mentions of `user_id` created at or after `since`, in API order
    async fn get_recent_mentions(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Mention>, String>;

    async fn get_tweet(&self, id: &str) -> Result<ConversationTweet, String>;

    /// Post `text` as a threaded reply to `in_reply_to_id`
    async fn post_reply(&self, text: &str, in_reply_to_id: &str) -> Result<PostedReply, String>;
}
