use crate::models::{ConversationTweet, Mention};
use crate::social::SocialClient;
use std::sync::Arc;

/// Maps a mention to the root tweet of the conversation it belongs to
pub struct MentionResolver {
    social: Arc<dyn SocialClient>,
}

impl MentionResolver {
    pub fn new(social: Arc<dyn SocialClient>) -> Self {
        Self { social }
    }

    /// `Ok(None)` when the mention carries no conversation id. A mention that
    /// starts its own conversation resolves to itself.
    pub async fn resolve(&self, mention: &Mention) -> Result<Option<ConversationTweet>, String> {
        let Some(conversation_id) = mention.conversation_id.as_deref() else {
            return Ok(None);
        };

        self.social.get_tweet(conversation_id).await.map(Some)
    }
}

/// True when the mention is itself the root of its conversation
pub fn is_root_mention(mention: &Mention, conversation: &ConversationTweet) -> bool {
    conversation.id == mention.id
}
