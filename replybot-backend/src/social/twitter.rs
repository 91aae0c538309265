//! Twitter API v2 client.
//!
//! Uses OAuth 1.0a user-context authentication and waits out rate limits
//! (HTTP 429) instead of failing the caller.

use super::oauth::{generate_oauth_header, query_string, TwitterCredentials};
use super::SocialClient;
use crate::models::{ConversationTweet, Mention, PostedReply};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use std::time::Duration;

/// Twitter API v2 base URL
const TWITTER_API_BASE: &str = "https://api.twitter.com/2";

/// Largest page the mentions endpoint allows
const MENTIONS_PAGE_SIZE: &str = "100";

/// Pages of mentions fetched per run before giving up on the rest
const MAX_MENTION_PAGES: usize = 5;

/// How many consecutive 429s a single request will sleep through
const MAX_RATE_LIMIT_WAITS: u32 = 3;

/// Wait used when a 429 carries no usable reset header
const DEFAULT_RATE_LIMIT_WAIT_SECS: u64 = 60;

/// Rate limit windows are 15 minutes; never sleep longer than one window
const MAX_RATE_LIMIT_WAIT_SECS: u64 = 15 * 60 + 5;

const TWEET_FIELDS: &str = "created_at,conversation_id";

/// Rate limit information from Twitter API response headers
#[derive(Debug, Clone, Default)]
struct RateLimitInfo {
    /// Remaining requests in current window
    remaining: Option<u32>,
    /// Unix timestamp when the rate limit resets
    reset_at: Option<u64>,
}

impl RateLimitInfo {
    /// Parse rate limit headers from a response
    fn from_response(response: &reqwest::Response) -> Self {
        Self::from_headers(response.headers())
    }

    fn from_headers(headers: &reqwest::header::HeaderMap) -> Self {
        let remaining = headers
            .get("x-rate-limit-remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        let reset_at = headers
            .get("x-rate-limit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        Self { remaining, reset_at }
    }

    /// Calculate how long to wait until rate limit resets (in seconds)
    fn seconds_until_reset(&self, now_unix: u64) -> Option<u64> {
        self.reset_at.map(|reset| reset.saturating_sub(now_unix))
    }

    /// How long to sleep after a 429
    fn wait_secs(&self, now_unix: u64) -> u64 {
        self.seconds_until_reset(now_unix)
            .map(|secs| secs + 1)
            .unwrap_or(DEFAULT_RATE_LIMIT_WAIT_SECS)
            .clamp(1, MAX_RATE_LIMIT_WAIT_SECS)
    }

    /// Returns true if we're rate limited (remaining == 0)
    fn is_rate_limited(&self) -> bool {
        self.remaining == Some(0)
    }
}

#[derive(Debug, Deserialize)]
struct TwitterApiError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

impl TwitterApiError {
    fn describe(&self) -> String {
        self.detail
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

fn join_errors(errors: &[TwitterApiError]) -> String {
    errors
        .iter()
        .map(|e| e.describe())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Deserialize)]
struct SingleUserResponse {
    data: Option<TwitterUser>,
}

#[derive(Debug, Deserialize)]
struct TwitterUser {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id: String,
    #[serde(default)]
    text: String,
    conversation_id: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl From<Tweet> for Mention {
    fn from(tweet: Tweet) -> Self {
        Mention {
            id: tweet.id,
            conversation_id: tweet.conversation_id,
            created_at: tweet.created_at,
        }
    }
}

impl From<Tweet> for ConversationTweet {
    fn from(tweet: Tweet) -> Self {
        ConversationTweet {
            id: tweet.id,
            text: tweet.text,
            created_at: tweet.created_at,
        }
    }
}

/// Twitter API v2 mentions response
#[derive(Debug, Deserialize)]
struct MentionsResponse {
    data: Option<Vec<Tweet>>,
    meta: Option<MentionsMeta>,
    errors: Option<Vec<TwitterApiError>>,
}

#[derive(Debug, Deserialize)]
struct MentionsMeta {
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SingleTweetResponse {
    data: Option<Tweet>,
    errors: Option<Vec<TwitterApiError>>,
}

/// Twitter API v2 tweet post response
#[derive(Debug, Deserialize)]
struct PostTweetResponse {
    data: Option<PostedTweet>,
    errors: Option<Vec<TwitterApiError>>,
}

#[derive(Debug, Deserialize)]
struct PostedTweet {
    id: String,
}

/// Format a mentions window boundary the way the API expects it
pub fn format_start_time(since: DateTime<Utc>) -> String {
    since.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn preview(text: &str) -> String {
    if text.chars().count() > 50 {
        format!("{}...", text.chars().take(50).collect::<String>())
    } else {
        text.to_string()
    }
}

pub struct TwitterClient {
    client: reqwest::Client,
    credentials: TwitterCredentials,
    api_base: String,
    /// Upper bound for a single rate limit sleep
    max_rate_limit_wait: Duration,
}

impl TwitterClient {
    pub fn new(credentials: TwitterCredentials) -> Self {
        Self::with_api_base(credentials, TWITTER_API_BASE)
    }

    pub fn with_api_base(credentials: TwitterCredentials, api_base: &str) -> Self {
        Self {
            client: crate::http::shared_client().clone(),
            credentials,
            api_base: api_base.trim_end_matches('/').to_string(),
            max_rate_limit_wait: Duration::from_secs(MAX_RATE_LIMIT_WAIT_SECS),
        }
    }

    #[cfg(test)]
    fn with_max_rate_limit_wait(mut self, max_wait: Duration) -> Self {
        self.max_rate_limit_wait = max_wait;
        self
    }

    /// Send a signed request, sleeping through rate limit responses.
    /// Returns the response body of the first non-429 success.
    async fn send_signed(
        &self,
        method: Method,
        url: &str,
        params: &[(&str, &str)],
        body: Option<&serde_json::Value>,
    ) -> Result<String, String> {
        let full_url = if params.is_empty() {
            url.to_string()
        } else {
            format!("{}?{}", url, query_string(params))
        };

        let mut waits = 0;
        loop {
            // Fresh nonce and timestamp on every attempt
            let auth_header =
                generate_oauth_header(method.as_str(), url, &self.credentials, Some(params));

            let mut request = self
                .client
                .request(method.clone(), &full_url)
                .header("Authorization", auth_header);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request
                .send()
                .await
                .map_err(|e| format!("Request failed: {}", e))?;

            // Parse rate limit headers before consuming response body
            let rate_limit = RateLimitInfo::from_response(&response);
            let status = response.status();
            let body_text = response.text().await.unwrap_or_default();

            log::debug!("Twitter {} {} response ({}): {}", method, url, status, body_text);

            if status.as_u16() == 429 {
                if waits >= MAX_RATE_LIMIT_WAITS {
                    return Err(format!(
                        "API error ({}): still rate limited after {} waits",
                        status, waits
                    ));
                }
                let wait = Duration::from_secs(rate_limit.wait_secs(unix_now()))
                    .min(self.max_rate_limit_wait);
                waits += 1;
                log::warn!(
                    "Twitter: Rate limited on {} {}, waiting {}s before retry ({}/{})",
                    method,
                    url,
                    wait.as_secs(),
                    waits,
                    MAX_RATE_LIMIT_WAITS
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if !status.is_success() {
                return Err(format!("API error ({}): {}", status, body_text));
            }

            if rate_limit.is_rate_limited() {
                log::warn!(
                    "Twitter: Rate limit exhausted for {}, reset in {:?}s",
                    url,
                    rate_limit.seconds_until_reset(unix_now())
                );
            }

            return Ok(body_text);
        }
    }
}

#[async_trait]
impl SocialClient for TwitterClient {
    async fn get_self_id(&self) -> Result<String, String> {
        let url = format!("{}/users/me", self.api_base);
        let body = self.send_signed(Method::GET, &url, &[], None).await?;

        let data: SingleUserResponse =
            serde_json::from_str(&body).map_err(|e| format!("Failed to parse response: {}", e))?;

        let user = data.data.ok_or_else(|| "No user data returned".to_string())?;
        log::info!("Twitter: Authenticated as @{} ({})", user.username, user.id);
        Ok(user.id)
    }

    async fn get_recent_mentions(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Mention>, String> {
        let url = format!("{}/users/{}/mentions", self.api_base, user_id);
        let start_time = format_start_time(since);

        let mut mentions = Vec::new();
        let mut pagination_token: Option<String> = None;

        for page in 0..MAX_MENTION_PAGES {
            let mut params: Vec<(&str, &str)> = vec![
                ("start_time", start_time.as_str()),
                ("expansions", "referenced_tweets.id"),
                ("tweet.fields", TWEET_FIELDS),
                ("max_results", MENTIONS_PAGE_SIZE),
            ];
            if let Some(token) = pagination_token.as_deref() {
                params.push(("pagination_token", token));
            }

            let body = self.send_signed(Method::GET, &url, &params, None).await?;
            let (page_mentions, next_token) = parse_mentions_page(&body)?;
            mentions.extend(page_mentions);

            match next_token {
                Some(token) if page + 1 < MAX_MENTION_PAGES => pagination_token = Some(token),
                Some(_) => {
                    log::warn!(
                        "Twitter: More than {} pages of mentions since {}, ignoring the rest",
                        MAX_MENTION_PAGES,
                        start_time
                    );
                    break;
                }
                None => break,
            }
        }

        log::debug!("Twitter: {} mention(s) since {}", mentions.len(), start_time);
        Ok(mentions)
    }

    async fn get_tweet(&self, id: &str) -> Result<ConversationTweet, String> {
        let url = format!("{}/tweets/{}", self.api_base, id);
        let params = [("tweet.fields", TWEET_FIELDS)];
        let body = self.send_signed(Method::GET, &url, &params, None).await?;
        parse_single_tweet(id, &body)
    }

    async fn post_reply(&self, text: &str, in_reply_to_id: &str) -> Result<PostedReply, String> {
        let url = format!("{}/tweets", self.api_base);
        let body = serde_json::json!({
            "text": text,
            "reply": {
                "in_reply_to_tweet_id": in_reply_to_id
            }
        });

        let response_body = self.send_signed(Method::POST, &url, &[], Some(&body)).await?;

        let data: PostTweetResponse = serde_json::from_str(&response_body)
            .map_err(|e| format!("Failed to parse response: {}", e))?;

        if let Some(errors) = data.errors.filter(|e| !e.is_empty()) {
            return Err(format!("Twitter API errors: {}", join_errors(&errors)));
        }

        let posted = data.data.ok_or_else(|| "No tweet data returned".to_string())?;
        log::info!(
            "Twitter: Posted reply {} to {} - {}",
            posted.id,
            in_reply_to_id,
            preview(text)
        );
        Ok(PostedReply { id: posted.id })
    }
}

/// Parse one page of mentions, returning the mentions and the next page token
fn parse_mentions_page(body: &str) -> Result<(Vec<Mention>, Option<String>), String> {
    let data: MentionsResponse =
        serde_json::from_str(body).map_err(|e| format!("Failed to parse response: {}", e))?;

    let tweets = data.data.unwrap_or_default();

    // Partial errors (e.g. an unavailable referenced tweet) come alongside data
    if let Some(errors) = data.errors.filter(|e| !e.is_empty()) {
        if tweets.is_empty() {
            return Err(format!("Twitter API errors: {}", join_errors(&errors)));
        }
        log::debug!("Twitter: Partial errors in mentions page: {}", join_errors(&errors));
    }

    let next_token = data.meta.and_then(|m| m.next_token);
    Ok((tweets.into_iter().map(Mention::from).collect(), next_token))
}

fn parse_single_tweet(id: &str, body: &str) -> Result<ConversationTweet, String> {
    let data: SingleTweetResponse =
        serde_json::from_str(body).map_err(|e| format!("Failed to parse response: {}", e))?;

    match (data.data, data.errors) {
        (Some(tweet), _) => Ok(tweet.into()),
        (None, Some(errors)) => Err(format!("Tweet {} unavailable: {}", id, join_errors(&errors))),
        (None, None) => Err(format!("Tweet {} not returned", id)),
    }
}
