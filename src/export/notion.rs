//! Notion export: snapshot → one page per entry in a Notion database.
//!
//! The target database needs Email (email), Timestamp (date), and
//! User Agent (rich text) properties, shared with the integration that owns
//! the API key. Individual page failures do not abort the run; the tally is
//! reported at the end.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context as _, Result};
use serde_json::{json, Value};
use tracing::warn;

use super::load_snapshot;
use crate::waitlist::WaitlistEntry;

const NOTION_API_BASE: &str = "https://api.notion.com";
const NOTION_VERSION: &str = "2022-06-28";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome tally of one export run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub succeeded: usize,
    pub failed: usize,
}

pub struct NotionExporter {
    client: reqwest::Client,
    api_key: String,
    database_id: String,
}

impl NotionExporter {
    pub fn new(api_key: impl Into<String>, database_id: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            database_id: database_id.into(),
        })
    }

    /// Push every snapshot entry, continuing past individual failures.
    /// `Ok(None)` when there is no snapshot to export.
    pub async fn export(&self, input: &Path) -> Result<Option<ExportSummary>> {
        let Some(entries) = load_snapshot(input)? else {
            return Ok(None);
        };

        let mut summary = ExportSummary::default();
        for entry in &entries {
            match self.create_page(entry).await {
                Ok(()) => {
                    summary.succeeded += 1;
                    println!("exported: {}", entry.email);
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(email = %entry.email, err = %e, "failed to export entry");
                }
            }
        }
        Ok(Some(summary))
    }

    async fn create_page(&self, entry: &WaitlistEntry) -> Result<()> {
        let resp = self
            .client
            .post(format!("{NOTION_API_BASE}/v1/pages"))
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .json(&page_payload(&self.database_id, entry))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Notion API error: {status} - {body}");
        }
        Ok(())
    }
}

/// Page-create payload for one entry. Absent user agents become "N/A" so the
/// rich-text property is never empty.
fn page_payload(database_id: &str, entry: &WaitlistEntry) -> Value {
    json!({
        "parent": { "database_id": database_id },
        "properties": {
            "Email": { "email": entry.email },
            "Timestamp": { "date": { "start": entry.registered_at } },
            "User Agent": {
                "rich_text": [
                    { "text": { "content": entry.client_info.as_deref().unwrap_or("N/A") } }
                ]
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(client_info: Option<&str>) -> WaitlistEntry {
        WaitlistEntry {
            email: "a@example.com".to_string(),
            registered_at: "2025-01-01T00:00:00.000Z".to_string(),
            client_info: client_info.map(str::to_string),
        }
    }

    #[test]
    fn payload_maps_all_properties() {
        let payload = page_payload("db-123", &entry(Some("curl/8.0")));
        assert_eq!(payload["parent"]["database_id"], "db-123");
        assert_eq!(payload["properties"]["Email"]["email"], "a@example.com");
        assert_eq!(
            payload["properties"]["Timestamp"]["date"]["start"],
            "2025-01-01T00:00:00.000Z"
        );
        assert_eq!(
            payload["properties"]["User Agent"]["rich_text"][0]["text"]["content"],
            "curl/8.0"
        );
    }

    #[test]
    fn absent_user_agent_becomes_na() {
        let payload = page_payload("db-123", &entry(None));
        assert_eq!(
            payload["properties"]["User Agent"]["rich_text"][0]["text"]["content"],
            "N/A"
        );
    }
}
