//! HTTP fetcher for downloading member lists.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::ApiConfig;

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_MS: u64 = 2000;

/// Maximum size of a member list response (10 MB)
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

/// Supplies the raw member list of a table.
///
/// An `Err` means "no data for this table in this run": the table is
/// skipped and the others are still processed.
#[async_trait]
pub trait MemberSource: Send + Sync {
    async fn fetch_members(&self, table: &str, url: &str) -> Result<Vec<String>>;
}

/// HTTP client for the allow-list API
pub struct Fetcher {
    client: Client,
    nas_name: Option<String>,
}

impl Fetcher {
    /// Create a fetcher from the API settings
    pub fn new(api: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .user_agent(format!("allowsync/{}", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(api.accept_invalid_certs)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            nas_name: api.effective_nas_name(),
        })
    }

    pub fn nas_name(&self) -> Option<&str> {
        self.nas_name.as_deref()
    }

    /// Fetch content with retry logic and size validation
    async fn fetch_with_retry(&self, url: &str) -> Result<String> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = RETRY_DELAY_MS * (1 << (attempt - 1));
                debug!("Retry {} after {}ms for {}", attempt, delay, url);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            let mut request = self.client.get(url);
            if let Some(ref nas_name) = self.nas_name {
                request = request.query(&[("nas_name", nas_name)]);
            }

            match request.send().await {
                Ok(response) => {
                    if response.status().is_success() {
                        if let Some(content_length) = response.content_length() {
                            if content_length as usize > MAX_RESPONSE_SIZE {
                                anyhow::bail!(
                                    "Response too large: {} bytes (max: {} bytes)",
                                    content_length,
                                    MAX_RESPONSE_SIZE
                                );
                            }
                        }

                        let body = response
                            .text()
                            .await
                            .context("Failed to read response body")?;

                        if body.len() > MAX_RESPONSE_SIZE {
                            anyhow::bail!(
                                "Downloaded content too large: {} bytes (max: {} bytes)",
                                body.len(),
                                MAX_RESPONSE_SIZE
                            );
                        }

                        return Ok(body);
                    }
                    last_error = Some(anyhow::anyhow!("HTTP {}", response.status()));
                }
                Err(e) => {
                    last_error = Some(e.into());
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Unknown error")))
    }
}

// No Default: building the client can fail.

#[async_trait]
impl MemberSource for Fetcher {
    async fn fetch_members(&self, table: &str, url: &str) -> Result<Vec<String>> {
        let body = self
            .fetch_with_retry(url)
            .await
            .with_context(|| format!("Failed to fetch members for {} from {}", table, url))?;

        let members = parse_member_list(&body)
            .with_context(|| format!("Invalid response for {} from {}", table, url))?;

        info!(table, "Fetched {} entries", members.len());
        Ok(members)
    }
}

/// Parse an API response into raw member entries.
///
/// The API answers with a JSON array of strings. A body that is not JSON is
/// read as a plain list, one entry per line, with `#` comments and blank
/// lines ignored. Entries are not validated here.
pub fn parse_member_list(body: &str) -> Result<Vec<String>> {
    let trimmed = body.trim_start();

    if trimmed.starts_with('[') {
        return serde_json::from_str::<Vec<String>>(trimmed)
            .context("Response is not a JSON array of strings");
    }

    if trimmed.starts_with('{') {
        anyhow::bail!("Expected a JSON array, got a JSON object");
    }

    Ok(trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
