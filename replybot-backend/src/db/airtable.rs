//! Airtable-backed reply log.
//!
//! Each record is one Airtable row whose fields are named after the
//! `ReplyRecord` fields.

use super::ReplyStore;
use crate::models::ReplyRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const AIRTABLE_API_BASE: &str = "https://api.airtable.com/v0";

/// Rows per list page (Airtable's maximum)
const PAGE_SIZE: &str = "100";

/// Guard against a server that never stops returning an offset
const MAX_PAGES: usize = 1_000;

#[derive(Debug, Deserialize)]
struct ListRecordsResponse {
    #[serde(default)]
    records: Vec<AirtableRow>,
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AirtableRow {
    #[serde(default)]
    fields: ReplyRecord,
}

#[derive(Debug, Serialize)]
struct CreateRecordRequest<'a> {
    fields: &'a ReplyRecord,
    typecast: bool,
}

#[derive(Debug, Deserialize)]
struct AirtableErrorResponse {
    error: AirtableError,
}

/// Airtable returns either `{"error": "NOT_FOUND"}` or `{"error": {"type": ..., "message": ...}}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AirtableError {
    Code(String),
    Detailed {
        #[serde(rename = "type")]
        error_type: String,
        message: Option<String>,
    },
}

impl std::fmt::Display for AirtableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AirtableError::Code(code) => write!(f, "{}", code),
            AirtableError::Detailed {
                error_type,
                message: Some(message),
            } => write!(f, "{}: {}", error_type, message),
            AirtableError::Detailed { error_type, .. } => write!(f, "{}", error_type),
        }
    }
}

pub struct AirtableStore {
    client: reqwest::Client,
    api_key: String,
    table_url: String,
    view: String,
}

impl AirtableStore {
    pub fn new(api_key: &str, base_key: &str, table_name: &str, view: &str) -> Self {
        Self::with_api_base(AIRTABLE_API_BASE, api_key, base_key, table_name, view)
    }

    pub fn with_api_base(
        api_base: &str,
        api_key: &str,
        base_key: &str,
        table_name: &str,
        view: &str,
    ) -> Self {
        Self {
            client: crate::http::shared_client().clone(),
            api_key: api_key.to_string(),
            table_url: table_url(api_base, base_key, table_name),
            view: view.to_string(),
        }
    }

    async fn list_page(&self, offset: Option<&str>) -> Result<ListRecordsResponse, String> {
        let mut query: Vec<(&str, &str)> = vec![("view", self.view.as_str()), ("pageSize", PAGE_SIZE)];
        if let Some(offset) = offset {
            query.push(("offset", offset));
        }

        let response = self
            .client
            .get(&self.table_url)
            .bearer_auth(&self.api_key)
            .query(&query)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(format!("Airtable API error ({}): {}", status, describe_error(&body)));
        }

        serde_json::from_str(&body).map_err(|e| format!("Failed to parse Airtable response: {}", e))
    }
}

#[async_trait]
impl ReplyStore for AirtableStore {
    async fn query_all(&self) -> Result<Vec<ReplyRecord>, String> {
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let page = self.list_page(offset.as_deref()).await?;
            records.extend(page.records.into_iter().map(|row| row.fields));

            match page.offset {
                Some(next) => offset = Some(next),
                None => {
                    log::debug!("Airtable: Loaded {} reply record(s)", records.len());
                    return Ok(records);
                }
            }
        }

        Err(format!("Airtable: gave up listing records after {} pages", MAX_PAGES))
    }

    async fn append(&self, record: &ReplyRecord) -> Result<(), String> {
        let request = CreateRecordRequest {
            fields: record,
            typecast: true,
        };

        let response = self
            .client
            .post(&self.table_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Airtable API error ({}): {}", status, describe_error(&body)));
        }

        log::debug!(
            "Airtable: Recorded reply {} to conversation {}",
            record.tweet_response_id,
            record.mentioned_conversation_tweet_id
        );
        Ok(())
    }
}

/// `{api_base}/{base}/{table}` with the table name path-encoded
fn table_url(api_base: &str, base_key: &str, table_name: &str) -> String {
    format!(
        "{}/{}/{}",
        api_base.trim_end_matches('/'),
        urlencoding::encode(base_key),
        urlencoding::encode(table_name)
    )
}

fn describe_error(body: &str) -> String {
    match serde_json::from_str::<AirtableErrorResponse>(body) {
        Ok(parsed) => parsed.error.to_string(),
        Err(_) => body.chars().take(200).collect(),
    }
}
