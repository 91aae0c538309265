use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::{ConversationTweet, Mention};

/// One row of the reply log: the bot answered `mentioned_conversation_tweet_id`.
///
/// Field names double as Airtable column names and sqlite column names.
/// Rows are append-only; at most one should exist per conversation tweet id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyRecord {
    #[serde(deserialize_with = "id_cell")]
    pub mentioned_conversation_tweet_id: String,
    pub mentioned_conversation_tweet_text: String,
    #[serde(deserialize_with = "id_cell")]
    pub tweet_response_id: String,
    pub tweet_response_text: String,
    /// ISO-8601 UTC
    pub tweet_response_created_at: String,
    /// ISO-8601 UTC, empty when the mention carried no timestamp
    pub mentioned_at: String,
}

impl ReplyRecord {
    /// Build the record for a reply that was just posted
    pub fn for_reply(
        mention: &Mention,
        conversation: &ConversationTweet,
        response_id: &str,
        response_text: &str,
        responded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            mentioned_conversation_tweet_id: conversation.id.clone(),
            mentioned_conversation_tweet_text: conversation.text.clone(),
            tweet_response_id: response_id.to_string(),
            tweet_response_text: response_text.to_string(),
            tweet_response_created_at: responded_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            mentioned_at: mention
                .created_at
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_default(),
        }
    }
}

/// Id columns may be typed as numbers on the Airtable side
fn id_cell<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(id) => Ok(id),
        serde_json::Value::Number(id) => Ok(id.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected a tweet id, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_for_reply_captures_both_sides() {
        let mention = Mention::new("10", Some("5"))
            .with_created_at(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
        let conversation = ConversationTweet::new("5", "DAOs are overrated");
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 4, 30).unwrap();

        let record = ReplyRecord::for_reply(&mention, &conversation, "99", "Not quite.", at);

        assert_eq!(record.mentioned_conversation_tweet_id, "5");
        assert_eq!(record.mentioned_conversation_tweet_text, "DAOs are overrated");
        assert_eq!(record.tweet_response_id, "99");
        assert_eq!(record.tweet_response_text, "Not quite.");
        assert_eq!(record.tweet_response_created_at, "2024-03-01T12:04:30.000000Z");
        assert_eq!(record.mentioned_at, "2024-03-01T12:00:00Z");
    }

    #[test]
    fn test_missing_mention_timestamp_leaves_field_empty() {
        let mention = Mention::new("10", Some("5"));
        let conversation = ConversationTweet::new("5", "gm");
        let record = ReplyRecord::for_reply(&mention, &conversation, "99", "gm", Utc::now());
        assert_eq!(record.mentioned_at, "");
    }

    #[test]
    fn test_deserialize_partial_row() {
        // Airtable omits empty cells entirely
        let record: ReplyRecord =
            serde_json::from_str(r#"{"mentioned_conversation_tweet_id": "42"}"#).unwrap();
        assert_eq!(record.mentioned_conversation_tweet_id, "42");
        assert!(record.tweet_response_id.is_empty());
    }

    #[test]
    fn test_numeric_id_cells_are_accepted() {
        let record: ReplyRecord = serde_json::from_str(
            r#"{"mentioned_conversation_tweet_id": 1766000000000000005, "tweet_response_id": null,
                "tweet_response_text": "Not quite."}"#,
        )
        .unwrap();

        assert_eq!(record.mentioned_conversation_tweet_id, "1766000000000000005");
        assert_eq!(record.tweet_response_id, "");
        assert_eq!(record.tweet_response_text, "Not quite.");
    }

    #[test]
    fn test_non_scalar_id_cell_is_rejected() {
        let parsed = serde_json::from_str::<ReplyRecord>(r#"{"mentioned_conversation_tweet_id": ["5"]}"#);
        assert!(parsed.is_err());
    }
}
