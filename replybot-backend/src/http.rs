//! Process-wide HTTP client shared by the Twitter, Airtable and model adapters.

use once_cell::sync::Lazy;
use std::time::Duration;

/// Upper bound for any single request (model completions included)
const REQUEST_TIMEOUT_SECS: u64 = 60;

static SHARED_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .user_agent(concat!("replybot/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|e| {
            log::warn!("Failed to build configured HTTP client, using defaults: {}", e);
            reqwest::Client::new()
        })
});

pub fn shared_client() -> &'static reqwest::Client {
    &SHARED_CLIENT
}
