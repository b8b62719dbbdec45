use crate::constants::{LRM_SHEET_URL, LRM_SOURCE};
use crate::date::{date_number_to_display, parse_loose_date};
use crate::error::Result;
use crate::http::check_ok;
use crate::identity::identity_key;
use crate::sources::fields::{
    bucket_distance, leading_int_ignoring_commas, non_empty, resolve_redirect,
};
use crate::types::{Brevet, BrevetSource};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

static ROW_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("table tr").expect("valid selector"));
static CELL_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("valid selector"));
static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("valid selector"));

/// Event names that mark spacer or header rows in the published sheet
const PLACEHOLDER_NAMES: [&str; 3] = ["-", "", "Event Name"];

/// One row of the Les Randonneurs Mondiaux calendar sheet
#[derive(Debug, Clone, Default, Serialize)]
pub struct LrmRow {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Start Location")]
    pub start_location: String,
    #[serde(rename = "Distance")]
    pub distance: String,
    #[serde(rename = "Event Name")]
    pub event_name: String,
    #[serde(rename = "Organizer")]
    pub organizer: String,
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "Elevation")]
    pub elevation: String,
    #[serde(rename = "Notes")]
    pub notes: String,
    pub links: LrmLinks,
}

/// Hyperlinks found in the linkable columns, already unwrapped
#[derive(Debug, Clone, Default, Serialize)]
pub struct LrmLinks {
    #[serde(rename = "Distance", skip_serializing_if = "Option::is_none")]
    pub distance: Option<String>,
    #[serde(rename = "Event Name", skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    #[serde(rename = "Organizer", skip_serializing_if = "Option::is_none")]
    pub organizer: Option<String>,
}

pub struct LrmSource {
    client: reqwest::Client,
}

impl LrmSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn cell_text(cell: Option<&ElementRef>) -> String {
    cell.map(|c| c.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

fn cell_link(cell: Option<&ElementRef>) -> Option<String> {
    let href = cell?.select(&LINK_SELECTOR).next()?.value().attr("href")?;
    non_empty(href).map(|h| resolve_redirect(&h))
}

/// Extract the calendar rows from the published sheet HTML, dropping placeholders.
pub fn parse_table(html: &str) -> Vec<LrmRow> {
    let document = Html::parse_document(html);
    let mut rows = Vec::new();

    for tr in document.select(&ROW_SELECTOR) {
        let cells: Vec<ElementRef> = tr.select(&CELL_SELECTOR).collect();
        if cells.is_empty() {
            continue;
        }
        let event_name = cell_text(cells.get(4));
        if PLACEHOLDER_NAMES.contains(&event_name.as_str()) {
            continue;
        }

        rows.push(LrmRow {
            date: cell_text(cells.first()),
            country: cell_text(cells.get(1)),
            start_location: cell_text(cells.get(2)),
            distance: cell_text(cells.get(3)),
            event_name,
            organizer: cell_text(cells.get(5)),
            time: cell_text(cells.get(6)),
            elevation: cell_text(cells.get(7)),
            notes: cell_text(cells.get(8)),
            links: LrmLinks {
                distance: cell_link(cells.get(3)),
                event_name: cell_link(cells.get(4)),
                organizer: cell_link(cells.get(5)),
            },
        });
    }
    debug!("Parsed {} LRM rows", rows.len());
    rows
}

/// Map sheet rows to brevets; distances are bucketed to the 100 km categories.
pub fn clean_brevets(rows: Vec<LrmRow>) -> Vec<Brevet> {
    rows.into_iter()
        .filter_map(|row| {
            let Some(date_number) = parse_loose_date(&row.date) else {
                warn!(event = %row.event_name, "Skipping LRM row with unparseable date '{}'", row.date);
                return None;
            };
            let date = date_number_to_display(date_number);
            let distance = leading_int_ignoring_commas(&row.distance)
                .and_then(|km| bucket_distance(km, 100));
            let object_id = identity_key(&date, distance, &row.country, &row.start_location);
            let meta = serde_json::to_value(&row).unwrap_or_default();

            let mut brevet = Brevet::new(object_id, date_number, meta);
            brevet.distance = distance;
            brevet.name = non_empty(&row.event_name);
            brevet.country = non_empty(&row.country);
            brevet.city = non_empty(&row.start_location);
            brevet.map = row.links.distance.into_iter().collect();
            brevet.site = row.links.event_name;
            brevet.club = non_empty(&row.organizer);
            brevet.ascent = leading_int_ignoring_commas(&row.elevation);
            Some(brevet)
        })
        .collect()
}

#[async_trait::async_trait]
impl BrevetSource for LrmSource {
    fn name(&self) -> &'static str {
        LRM_SOURCE
    }

    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<Vec<Brevet>> {
        info!("Fetching LRM brevets");
        let response = self.client.get(LRM_SHEET_URL).send().await?;
        let html = check_ok(response, LRM_SOURCE)?.text().await?;

        let brevets = clean_brevets(parse_table(&html));
        if brevets.is_empty() {
            warn!("No LRM brevets found - the sheet layout may have changed");
        }
        info!("Mapped {} LRM brevets", brevets.len());
        Ok(brevets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links_are_unwrapped() {
        let html = r#"<table><tr>
            <td>12/Apr/2025</td><td>Japan</td><td>Tokyo</td>
            <td><a href="https://www.google.com/url?q=https://ridewithgps.com/routes/1&amp;sa=D">1,234</a></td>
            <td><a href="https://example.jp/event">Tokyo 1200</a></td>
            <td>AJ Tokyo</td><td>90h</td><td>12,000</td><td></td>
        </tr></table>"#;

        let rows = parse_table(html);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].links.distance.as_deref(), Some("https://ridewithgps.com/routes/1"));

        let brevets = clean_brevets(rows);
        assert_eq!(brevets[0].object_id, "12/04/2025__1200__Japan__Tokyo");
        assert_eq!(brevets[0].distance, Some(1200));
        assert_eq!(brevets[0].ascent, Some(12000));
        assert_eq!(brevets[0].site.as_deref(), Some("https://example.jp/event"));
        assert_eq!(brevets[0].meta["links"]["Distance"], "https://ridewithgps.com/routes/1");
    }
}
