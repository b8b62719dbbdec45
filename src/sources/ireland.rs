use crate::constants::{IRELAND_CALENDAR_URL, IRELAND_SOURCE};
use crate::date::{date_number_to_display, parse_loose_date};
use crate::error::{Result, SyncError};
use crate::http::check_ok;
use crate::identity::identity_key;
use crate::sources::fields::{exact_distance, leading_int, non_empty, starts_with_digit};
use crate::sources::spreadsheet::{column, sheet_rows, SheetRow};
use crate::types::{Brevet, BrevetSource};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, instrument};

// e.g. https://www.audaxireland.org/wp-content/uploads/2024/07/Audax-Ireland-Calendar-2024-Excel.xlsx
static XLSX_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https://www\.audaxireland\.org/wp-content/.+?\.xlsx").expect("valid regex")
});

const COUNTRY: &str = "Ireland";

pub struct IrelandSource {
    client: reqwest::Client,
}

impl IrelandSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// First workbook link on the calendar page; the file name changes every season.
pub fn find_workbook_url(page: &str) -> Result<String> {
    XLSX_LINK
        .find(page)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| SyncError::DiscoveryFailed {
            source_name: IRELAND_SOURCE.to_string(),
            url: IRELAND_CALENDAR_URL.to_string(),
        })
}

pub fn clean_brevets(rows: Vec<SheetRow>) -> Vec<Brevet> {
    rows.into_iter()
        .filter(|row| starts_with_digit(column(row, "Date")))
        .filter_map(|row| {
            let Some(date_number) = parse_loose_date(column(&row, "Date")) else {
                debug!("Skipping Audax Ireland row with unparseable date '{}'", column(&row, "Date"));
                return None;
            };
            let date = date_number_to_display(date_number);
            let distance = leading_int(column(&row, "Distance"))
                .and_then(exact_distance)
                .or(Some(0));
            let start = column(&row, "Start").to_string();

            let mut brevet = Brevet::new(
                identity_key(&date, distance, COUNTRY, &start),
                date_number,
                serde_json::to_value(&row).unwrap_or_default(),
            );
            brevet.name = non_empty(column(&row, "Event Name"));
            brevet.distance = distance;
            brevet.country = Some(COUNTRY.to_string());
            brevet.region = non_empty(column(&row, "Province"));
            brevet.city = non_empty(&start);
            brevet.site = Some(IRELAND_CALENDAR_URL.to_string());
            brevet.mail = non_empty(column(&row, "E-Mail"));
            brevet.club = non_empty(column(&row, "Organising Club"));
            brevet.ascent = Some(0);
            Some(brevet)
        })
        .collect()
}

#[async_trait::async_trait]
impl BrevetSource for IrelandSource {
    fn name(&self) -> &'static str {
        IRELAND_SOURCE
    }

    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<Vec<Brevet>> {
        info!("Fetching Audax Ireland calendar page");
        let response = self.client.get(IRELAND_CALENDAR_URL).send().await?;
        let page = check_ok(response, IRELAND_SOURCE)?.text().await?;
        let workbook_url = find_workbook_url(&page)?;

        info!(url = %workbook_url, "Downloading Audax Ireland workbook");
        let response = self.client.get(&workbook_url).send().await?;
        let bytes = check_ok(response, IRELAND_SOURCE)?.bytes().await?;

        let brevets = clean_brevets(sheet_rows(&bytes)?);
        info!("Mapped {} Audax Ireland brevets", brevets.len());
        Ok(brevets)
    }
}
