use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An inbound notification referencing the bot's account.
///
/// Produced by the social client and consumed once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub id: String,
    /// Root of the thread this mention belongs to (equal to `id` for a root post)
    pub conversation_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
impl Mention {
    pub fn new(id: impl Into<String>, conversation_id: Option<&str>) -> Self {
        Self {
            id: id.into(),
            conversation_id: conversation_id.map(|c| c.to_string()),
            created_at: None,
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// The tweet a mention is actually about. Resolved per run, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTweet {
    pub id: String,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
impl ConversationTweet {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            created_at: None,
        }
    }
}

/// A tweet created by the bot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedReply {
    pub id: String,
}
