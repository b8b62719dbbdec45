//! Paginated transport for WordPress sites running The Events Calendar
//! (`/wp-json/tribe/events/v1/events/`).

use crate::error::{Result, SyncError};
use crate::http::check_ok;
use serde::Deserialize;
use tracing::debug;

const PER_PAGE: &str = "50";

/// Publication window sent with every page request (`YYYY-MM-DD HH:MM:SS`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TribeWindow {
    pub start_date: String,
    pub end_date: String,
}

/// One page of the events endpoint
#[derive(Debug, Deserialize)]
pub struct TribePage {
    #[serde(default)]
    pub events: Vec<serde_json::Value>,
    #[serde(default)]
    pub total_pages: u32,
}

/// `start_date_details` block shared by every Tribe event
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateDetails {
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub month: String,
    #[serde(default)]
    pub day: String,
}

impl DateDetails {
    /// `YYYYMMDD` from the zero-padded string parts
    pub fn date_number(&self) -> Option<u32> {
        let year: u32 = self.year.trim().parse().ok()?;
        let month: u32 = self.month.trim().parse().ok()?;
        let day: u32 = self.day.trim().parse().ok()?;
        chrono::NaiveDate::from_ymd_opt(year as i32, month, day)?;
        Some(year * 10_000 + month * 100 + day)
    }
}

/// Decode one page body, rejecting anything that is not the expected envelope.
pub fn decode_page(body: serde_json::Value, source_name: &str) -> Result<TribePage> {
    if !body.is_object() {
        return Err(SyncError::invalid_response(source_name, "expected a JSON object"));
    }
    serde_json::from_value(body).map_err(|e| SyncError::invalid_response(source_name, e.to_string()))
}

/// Source of raw page bodies, numbered from 1
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, page: u32) -> Result<serde_json::Value>;
}

/// Pages requested over HTTP with the publication window as query
pub struct HttpPageFetcher<'a> {
    client: &'a reqwest::Client,
    base_url: &'a str,
    window: &'a TribeWindow,
    source_name: &'a str,
}

#[async_trait::async_trait]
impl PageFetcher for HttpPageFetcher<'_> {
    async fn fetch_page(&self, page: u32) -> Result<serde_json::Value> {
        let page_str = page.to_string();
        let query = [
            ("page", page_str.as_str()),
            ("per_page", PER_PAGE),
            ("start_date", self.window.start_date.as_str()),
            ("end_date", self.window.end_date.as_str()),
            ("status", "publish"),
        ];
        let response = self.client.get(self.base_url).query(&query).send().await?;
        Ok(check_ok(response, self.source_name)?.json().await?)
    }
}

/// Request pages `1..=total_pages` in order and concatenate their events.
/// Any failing page fails the whole collection.
pub async fn collect_pages(fetcher: &dyn PageFetcher, source_name: &str) -> Result<Vec<serde_json::Value>> {
    let mut events = Vec::new();
    let mut page: u32 = 1;
    loop {
        let decoded = decode_page(fetcher.fetch_page(page).await?, source_name)?;
        debug!(
            source = source_name,
            page,
            total_pages = decoded.total_pages,
            events = decoded.events.len(),
            "Fetched events page"
        );
        events.extend(decoded.events);

        if decoded.total_pages > page {
            page += 1;
        } else {
            break;
        }
    }
    Ok(events)
}

pub async fn fetch_all_events(
    client: &reqwest::Client,
    base_url: &str,
    window: &TribeWindow,
    source_name: &str,
) -> Result<Vec<serde_json::Value>> {
    let fetcher = HttpPageFetcher {
        client,
        base_url,
        window,
        source_name,
    };
    collect_pages(&fetcher, source_name).await
}
