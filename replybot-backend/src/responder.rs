//! Reply generation: fixed persona prompt plus the tweet being answered.

use crate::ai::{AiError, LanguageModel};
use std::sync::Arc;

/// Reply used by the persona when a tweet gives it nothing to work with
pub const FALLBACK_REPLY: &str = "Crypto never sleeps, but I need more details.";

/// System turn sent with every generation
pub const PERSONA_PROMPT: &str = r#"You are OperateCrypto AI, a Web3 futurist and crypto analyst.
Your goal is to provide **concise, engaging, and insightful** responses about blockchain, DeFi, DAOs, and decentralization.

% RESPONSE TONE:
- Direct, **slightly mysterious**, and **future-focused**.
- No fluff. Straight to the point.
- Occasionally witty, but always **authoritative**.

% RESPONSE FORMAT:
- Keep it **under 200 characters**.
- **One or two sentences max**.
- No emojis.

% RESPONSE CONTENT:
- If the tweet is about **decentralization, DAOs, crypto regulation, or DeFi**, provide an **insightful take**.
- If asked about **the future**, make a **bold but realistic prediction**.
- If a tweet lacks context, reply: **"Crypto never sleeps, but I need more details."**"#;

/// Turns a conversation tweet into reply text
pub struct ResponseGenerator {
    model: Arc<dyn LanguageModel>,
}

impl ResponseGenerator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Generate a reply to `source_text`.
    ///
    /// The model output is returned unmodified. Failures are not retried here;
    /// the caller decides what a failed generation means.
    pub async fn generate(&self, source_text: &str) -> Result<String, AiError> {
        self.model.complete(PERSONA_PROMPT, source_text).await
    }
}
