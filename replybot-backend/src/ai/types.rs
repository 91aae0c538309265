use serde::{Deserialize, Serialize};

/// Error returned by a language model call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiError {
    pub message: String,
    /// HTTP status of the failed call, when there was one
    pub status_code: Option<u16>,
}

impl AiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: None,
        }
    }

    pub fn with_status(message: impl Into<String>, status_code: u16) -> Self {
        Self {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Worth retrying: transport failures, rate limits and gateway errors
    pub fn is_transient(&self) -> bool {
        match self.status_code {
            None => true,
            Some(code) => matches!(code, 429 | 500 | 502 | 503 | 504),
        }
    }
}

impl std::fmt::Display for AiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (HTTP {})", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for AiError {}
