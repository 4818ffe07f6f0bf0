//! services/api/src/adapters/notion.rs
//!
//! This module contains the adapter for the Notion page API.
//! It implements the `PageSubmissionService` port from the `core` crate.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::HeaderValue, Client, StatusCode};
use serde_json::{json, Value};
use study_path_core::domain::PageRecord;
use study_path_core::ports::{PageSubmissionService, PortError, PortResult};
use tracing::{debug, warn};

const PAGE_ICON_EMOJI: &str = "📖";

/// Longest `Retry-After` delay the adapter is willing to wait for.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Bounded exponential backoff for transient submission failures.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Where new pages go and how they are dressed.
#[derive(Clone, Debug)]
pub struct NotionSettings {
    pub api_url: String,
    pub token: String,
    pub version: String,
    pub parent_page_id: String,
    pub cover_url: String,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `PageSubmissionService` using the Notion REST API.
#[derive(Clone)]
pub struct NotionPageAdapter {
    client: Client,
    settings: NotionSettings,
    retry: RetryPolicy,
}

impl NotionPageAdapter {
    /// Creates a new `NotionPageAdapter`.
    pub fn new(client: Client, settings: NotionSettings, retry: RetryPolicy) -> Self {
        Self {
            client,
            settings,
            retry,
        }
    }

    /// The create-page request body for `record`.
    pub fn page_body(&self, record: &PageRecord) -> Value {
        json!({
            "parent": { "page_id": self.settings.parent_page_id },
            "icon": { "emoji": PAGE_ICON_EMOJI },
            "cover": { "external": { "url": self.settings.cover_url } },
            "properties": record.properties,
            "children": record.children,
        })
    }
}

//=========================================================================================
// `PageSubmissionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl PageSubmissionService for NotionPageAdapter {
    async fn create_page(&self, record: &PageRecord) -> PortResult<()> {
        let url = format!("{}/pages", self.settings.api_url);
        let body = self.page_body(record);
        let mut attempt = 1;

        loop {
            let result = self
                .client
                .post(&url)
                .bearer_auth(&self.settings.token)
                .header("Notion-Version", &self.settings.version)
                .json(&body)
                .send()
                .await;

            let retry_in = match result {
                Ok(response) if response.status().is_success() => {
                    debug!(attempt, "Notion page created.");
                    return Ok(());
                }
                Ok(response) => {
                    let status = response.status();
                    let retry_after = parse_retry_after(response.headers().get("retry-after"));
                    let message = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Failed to read Notion error body".to_string());
                    if !is_retryable_status(status) || attempt >= self.retry.max_attempts {
                        return Err(PortError::Upstream {
                            status: status.as_u16(),
                            message,
                        });
                    }
                    warn!(attempt, status = status.as_u16(), "Notion rejected the page, retrying.");
                    retry_after.unwrap_or_else(|| self.retry.delay_for(attempt))
                }
                Err(e) => {
                    if !(e.is_connect() || e.is_timeout()) || attempt >= self.retry.max_attempts {
                        return Err(PortError::Unexpected(format!("Notion API request failed: {e}")));
                    }
                    warn!(attempt, error = %e, "Notion request failed, retrying.");
                    self.retry.delay_for(attempt)
                }
            };

            tokio::time::sleep(retry_in).await;
            attempt += 1;
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let seconds = header?.to_str().ok()?.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(seconds).min(MAX_RETRY_AFTER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use study_path_core::blocks;

    fn adapter() -> NotionPageAdapter {
        NotionPageAdapter::new(
            Client::new(),
            NotionSettings {
                api_url: "http://localhost".to_string(),
                token: "secret".to_string(),
                version: "2022-06-28".to_string(),
                parent_page_id: "parent-123".to_string(),
                cover_url: "https://img.example/cover.jpg".to_string(),
            },
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(100),
            },
        )
    }

    #[test]
    fn body_carries_parent_icon_and_cover() {
        let record = PageRecord {
            properties: blocks::title_property("SQL"),
            children: vec![blocks::heading_2("Recommended Courses")],
        };
        let body = adapter().page_body(&record);

        assert_eq!(body["parent"]["page_id"], "parent-123");
        assert_eq!(body["icon"]["emoji"], "📖");
        assert_eq!(body["cover"]["external"]["url"], "https://img.example/cover.jpg");
        assert_eq!(body["children"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["properties"]["title"]["type"], "title");
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let retry = adapter().retry;
        assert_eq!(retry.delay_for(1), Duration::from_millis(100));
        assert_eq!(retry.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn retry_after_is_capped() {
        let header = HeaderValue::from_static("3600");
        assert_eq!(parse_retry_after(Some(&header)), Some(MAX_RETRY_AFTER));
        assert_eq!(parse_retry_after(Some(&HeaderValue::from_static("soon"))), None);
    }

    #[test]
    fn only_throttling_and_server_errors_are_retried() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
    }
}
