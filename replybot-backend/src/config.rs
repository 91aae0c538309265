use crate::social::TwitterCredentials;
use std::env;
use std::str::FromStr;

/// Environment variable names - single source of truth
pub mod env_vars {
    // Twitter OAuth 1.0a (user context)
    pub const TWITTER_API_KEY: &str = "TWITTER_API_KEY";
    pub const TWITTER_API_SECRET: &str = "TWITTER_API_SECRET";
    pub const TWITTER_ACCESS_TOKEN: &str = "TWITTER_ACCESS_TOKEN";
    pub const TWITTER_ACCESS_TOKEN_SECRET: &str = "TWITTER_ACCESS_TOKEN_SECRET";
    pub const TWITTER_BEARER_TOKEN: &str = "TWITTER_BEARER_TOKEN";
    // Reply store
    pub const REPLY_STORE: &str = "REPLY_STORE";
    pub const AIRTABLE_API_KEY: &str = "AIRTABLE_API_KEY";
    pub const AIRTABLE_BASE_KEY: &str = "AIRTABLE_BASE_KEY";
    pub const AIRTABLE_TABLE_NAME: &str = "AIRTABLE_TABLE_NAME";
    pub const AIRTABLE_VIEW: &str = "AIRTABLE_VIEW";
    pub const DATABASE_URL: &str = "DATABASE_URL";
    // Language model
    pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
    pub const LLM_API_KEY: &str = "LLM_API_KEY";
    pub const LLM_ENDPOINT: &str = "LLM_ENDPOINT";
    pub const LLM_MODEL: &str = "LLM_MODEL";
    pub const LLM_TEMPERATURE: &str = "LLM_TEMPERATURE";
    pub const LLM_MAX_TOKENS: &str = "LLM_MAX_TOKENS";
    // Scheduling and triage
    pub const RUN_INTERVAL_SECS: &str = "RUN_INTERVAL_SECS";
    pub const RUN_ON_STARTUP: &str = "RUN_ON_STARTUP";
    pub const MENTION_LOOKBACK_MINUTES: &str = "MENTION_LOOKBACK_MINUTES";
    pub const TWEET_RESPONSE_LIMIT: &str = "TWEET_RESPONSE_LIMIT";
}

/// Default values
pub mod defaults {
    pub const DATABASE_URL: &str = "./.db/replies.db";
    pub const AIRTABLE_VIEW: &str = "Grid view";
    pub const LLM_ENDPOINT: &str =
        "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions";
    pub const LLM_MODEL: &str = "gemini-1.5-flash";
    pub const LLM_TEMPERATURE: f32 = 0.6;
    pub const LLM_MAX_TOKENS: u32 = 256;
    /// Six minutes between runs
    pub const RUN_INTERVAL_SECS: u64 = 360;
    pub const MENTION_LOOKBACK_MINUTES: i64 = 20;
    pub const TWEET_RESPONSE_LIMIT: usize = 35;
}

/// Which backing store holds the reply log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Airtable {
        api_key: String,
        base_key: String,
        table_name: String,
        view: String,
    },
    Sqlite {
        database_url: String,
    },
}

impl StoreConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreConfig::Airtable { .. } => "airtable",
            StoreConfig::Sqlite { .. } => "sqlite",
        }
    }
}

/// Language model endpoint settings
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub twitter: TwitterCredentials,
    /// Not used by the user-context endpoints; loaded so a misconfigured env is visible in logs
    pub twitter_bearer_token: Option<String>,
    pub store: StoreConfig,
    pub llm: LlmConfig,
    pub run_interval_secs: u64,
    pub run_on_startup: bool,
    pub mention_lookback_minutes: i64,
    pub tweet_response_limit: usize,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Any missing credential is an error: the caller must not start scheduling.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |name: &str| get(name).ok_or_else(|| format!("{} not configured", name));

        let twitter = TwitterCredentials::new(
            require(env_vars::TWITTER_API_KEY)?,
            require(env_vars::TWITTER_API_SECRET)?,
            require(env_vars::TWITTER_ACCESS_TOKEN)?,
            require(env_vars::TWITTER_ACCESS_TOKEN_SECRET)?,
        );

        let store = match get(env_vars::REPLY_STORE)
            .unwrap_or_else(|| "airtable".to_string())
            .to_lowercase()
            .as_str()
        {
            "airtable" => StoreConfig::Airtable {
                api_key: require(env_vars::AIRTABLE_API_KEY)?,
                base_key: require(env_vars::AIRTABLE_BASE_KEY)?,
                table_name: require(env_vars::AIRTABLE_TABLE_NAME)?,
                view: get(env_vars::AIRTABLE_VIEW)
                    .unwrap_or_else(|| defaults::AIRTABLE_VIEW.to_string()),
            },
            "sqlite" => StoreConfig::Sqlite {
                database_url: get(env_vars::DATABASE_URL)
                    .unwrap_or_else(|| defaults::DATABASE_URL.to_string()),
            },
            other => {
                return Err(format!(
                    "{} must be 'airtable' or 'sqlite' (got '{}')",
                    env_vars::REPLY_STORE,
                    other
                ))
            }
        };

        let llm_api_key = get(env_vars::GEMINI_API_KEY)
            .or_else(|| get(env_vars::LLM_API_KEY))
            .ok_or_else(|| format!("{} not configured", env_vars::GEMINI_API_KEY))?;

        let llm = LlmConfig {
            api_key: llm_api_key,
            endpoint: get(env_vars::LLM_ENDPOINT)
                .unwrap_or_else(|| defaults::LLM_ENDPOINT.to_string()),
            model: get(env_vars::LLM_MODEL).unwrap_or_else(|| defaults::LLM_MODEL.to_string()),
            temperature: parse_or(&get, env_vars::LLM_TEMPERATURE, defaults::LLM_TEMPERATURE),
            max_tokens: parse_or(&get, env_vars::LLM_MAX_TOKENS, defaults::LLM_MAX_TOKENS),
        };

        Ok(Self {
            twitter,
            twitter_bearer_token: get(env_vars::TWITTER_BEARER_TOKEN),
            store,
            llm,
            run_interval_secs: parse_or(&get, env_vars::RUN_INTERVAL_SECS, defaults::RUN_INTERVAL_SECS)
                .max(1),
            run_on_startup: get(env_vars::RUN_ON_STARTUP)
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            mention_lookback_minutes: parse_or(
                &get,
                env_vars::MENTION_LOOKBACK_MINUTES,
                defaults::MENTION_LOOKBACK_MINUTES,
            )
            .max(1),
            tweet_response_limit: parse_or(
                &get,
                env_vars::TWEET_RESPONSE_LIMIT,
                defaults::TWEET_RESPONSE_LIMIT,
            ),
        })
    }

    /// Warning text when the mention window does not outlast the run
    /// interval, so mentions posted between runs would never be fetched
    pub fn lookback_gap_warning(&self) -> Option<String> {
        let lookback_secs = u64::try_from(self.mention_lookback_minutes)
            .unwrap_or(0)
            .saturating_mul(60);
        if lookback_secs > self.run_interval_secs {
            return None;
        }
        Some(format!(
            "{}={} ({}s) does not exceed {}={}; mentions between runs will be missed",
            env_vars::MENTION_LOOKBACK_MINUTES,
            self.mention_lookback_minutes,
            lookback_secs,
            env_vars::RUN_INTERVAL_SECS,
            self.run_interval_secs
        ))
    }
}

/// Parse a tunable, falling back to the default (with a warning) when it is not a valid value
fn parse_or<T, G>(get: &G, name: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!("{}='{}' is not valid, using default {}", name, raw, default);
            default
        }),
        None => default,
    }
}
