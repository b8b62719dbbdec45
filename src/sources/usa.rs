use crate::constants::{USA_SEARCH_URL, USA_SOURCE};
use crate::date::{date_number_to_display, parse_loose_date};
use crate::error::Result;
use crate::http::check_ok;
use crate::identity::identity_key;
use crate::sources::fields::{absolute_url, bucket_distance, leading_int, non_empty};
use crate::types::{Brevet, BrevetSource};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

static ROW_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table[width] tbody tr").expect("valid selector"));
static CELL_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("valid selector"));
static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("valid selector"));

static STATES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("AK", "Alaska"),
        ("AL", "Alabama"),
        ("AR", "Arkansas"),
        ("AZ", "Arizona"),
        ("CA", "California"),
        ("CO", "Colorado"),
        ("CT", "Connecticut"),
        ("DC", "District of Columbia"),
        ("DE", "Delaware"),
        ("FL", "Florida"),
        ("GA", "Georgia"),
        ("HI", "Hawaii"),
        ("IA", "Iowa"),
        ("ID", "Idaho"),
        ("IL", "Illinois"),
        ("IN", "Indiana"),
        ("KS", "Kansas"),
        ("KY", "Kentucky"),
        ("LA", "Louisiana"),
        ("MA", "Massachusetts"),
        ("MD", "Maryland"),
        ("ME", "Maine"),
        ("MI", "Michigan"),
        ("MN", "Minnesota"),
        ("MO", "Missouri"),
        ("MS", "Mississippi"),
        ("MT", "Montana"),
        ("NC", "North Carolina"),
        ("ND", "North Dakota"),
        ("NE", "Nebraska"),
        ("NH", "New Hampshire"),
        ("NJ", "New Jersey"),
        ("NM", "New Mexico"),
        ("NV", "Nevada"),
        ("NY", "New York"),
        ("OH", "Ohio"),
        ("OK", "Oklahoma"),
        ("OR", "Oregon"),
        ("PA", "Pennsylvania"),
        ("RI", "Rhode Island"),
        ("SC", "South Carolina"),
        ("SD", "South Dakota"),
        ("TN", "Tennessee"),
        ("TX", "Texas"),
        ("UT", "Utah"),
        ("VA", "Virginia"),
        ("VT", "Vermont"),
        ("WA", "Washington"),
        ("WI", "Wisconsin"),
        ("WV", "West Virginia"),
        ("WY", "Wyoming"),
    ])
});

const COUNTRY: &str = "USA";

/// One row of the RUSA event search results
#[derive(Debug, Clone, Default, Serialize)]
pub struct UsaRow {
    pub location: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub date: String,
    pub distance: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,
    pub contact: String,
    #[serde(rename = "contactLink", skip_serializing_if = "Option::is_none")]
    pub contact_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

pub struct UsaSource {
    client: reqwest::Client,
}

impl UsaSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

pub fn state_name(code: &str) -> Option<&'static str> {
    STATES.get(code.trim()).copied()
}

fn text_at(cells: &[ElementRef], i: usize) -> String {
    cells
        .get(i)
        .map(|c| c.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

fn link_at(cells: &[ElementRef], i: usize) -> Option<String> {
    let href = cells.get(i)?.select(&LINK_SELECTOR).next()?.value().attr("href")?;
    absolute_url(USA_SEARCH_URL, href)
}

pub fn parse_table(html: &str) -> Vec<UsaRow> {
    let document = Html::parse_document(html);
    document
        .select(&ROW_SELECTOR)
        .filter_map(|tr| {
            let cells: Vec<ElementRef> = tr.select(&CELL_SELECTOR).collect();
            if cells.is_empty() {
                return None;
            }
            Some(UsaRow {
                location: text_at(&cells, 0),
                kind: text_at(&cells, 1),
                date: text_at(&cells, 2),
                distance: text_at(&cells, 3),
                name: text_at(&cells, 4),
                map: link_at(&cells, 4),
                contact: text_at(&cells, 5),
                contact_link: link_at(&cells, 5),
                link: link_at(&cells, 6),
            })
        })
        .collect()
}

/// Map RUSA rows (`ST: City`, `YYYY/MM/DD`) to brevets.
pub fn clean_brevets(rows: Vec<UsaRow>) -> Vec<Brevet> {
    rows.into_iter()
        .filter_map(|row| {
            let Some(date_number) = parse_loose_date(&row.date) else {
                debug!(name = %row.name, "Skipping RUSA row with unparseable date '{}'", row.date);
                return None;
            };
            let date = date_number_to_display(date_number);
            let (state, city) = match row.location.split_once(": ") {
                Some((state, city)) => (state.to_string(), city.to_string()),
                None => (row.location.clone(), String::new()),
            };
            let distance = leading_int(&row.distance).and_then(|km| bucket_distance(km, 100));
            let meta = serde_json::to_value(&row).unwrap_or_default();

            let mut brevet = Brevet::new(identity_key(&date, distance, COUNTRY, &city), date_number, meta);
            brevet.name = non_empty(&row.name);
            brevet.distance = distance;
            brevet.city = non_empty(&city);
            brevet.region = state_name(&state).map(str::to_string);
            brevet.country = Some(COUNTRY.to_string());
            brevet.site = row.link;
            brevet.mail = row.contact_link;
            brevet.map = row.map.into_iter().collect();
            Some(brevet)
        })
        .collect()
}

#[async_trait::async_trait]
impl BrevetSource for UsaSource {
    fn name(&self) -> &'static str {
        USA_SOURCE
    }

    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<Vec<Brevet>> {
        info!("Fetching RUSA brevets");
        let response = self.client.get(USA_SEARCH_URL).send().await?;
        let html = check_ok(response, USA_SOURCE)?.text().await?;

        let brevets = clean_brevets(parse_table(&html));
        info!("Mapped {} RUSA brevets", brevets.len());
        Ok(brevets)
    }
}
