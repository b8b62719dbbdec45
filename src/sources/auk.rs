use crate::constants::{AUK_EVENT_BASE_URL, AUK_SEARCH_URL, AUK_SOURCE};
use crate::date::{date_number_to_display, date_to_date_number, parse_loose_date, DateNumber};
use crate::error::{Result, SyncError};
use crate::http::check_ok;
use crate::identity::identity_key;
use crate::sources::fields::{absolute_url, exact_distance, identity_safe, non_empty};
use crate::types::{Brevet, BrevetSource, GeoPoint};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::{debug, info, instrument};

const COUNTRY: &str = "UK";

/// Item of the Audax UK event search
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AukItem {
    #[serde(default)]
    start_condition: String,
    #[serde(default)]
    start_address_description: String,
    #[serde(default)]
    event_date_formatted: String,
    #[serde(default)]
    award_distance: Option<i64>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    is_cancelled: bool,
    #[serde(default)]
    start_latitude: Option<f64>,
    #[serde(default)]
    start_longitude: Option<f64>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    climb: Option<i64>,
    #[serde(default)]
    url: Option<String>,
}

pub struct AukSource {
    client: reqwest::Client,
}

impl AukSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Parse the event date as Audax UK formats it, falling back to loose forms.
pub fn parse_event_date(text: &str) -> Option<DateNumber> {
    let text = text.trim();
    let datetime_formats = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];
    for format in &datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(date_to_date_number(dt.date()));
        }
    }
    let date_formats = [
        "%a %d %b %Y",  // "Sat 08 Mar 2025"
        "%A %d %B %Y",  // "Saturday 08 March 2025"
        "%A, %d %B %Y", // "Saturday, 08 March 2025"
        "%d %B %Y",     // "08 March 2025"
        "%d %b %Y",     // "08 Mar 2025"
        "%B %d, %Y",    // "March 8, 2025"
    ];
    for format in &date_formats {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date_to_date_number(date));
        }
    }
    parse_loose_date(text)
}

/// Pull the `Items` array out of the search envelope.
pub fn extract_items(body: serde_json::Value) -> Result<Vec<serde_json::Value>> {
    match body {
        serde_json::Value::Object(mut map) => match map.remove("Items") {
            Some(serde_json::Value::Array(items)) => Ok(items),
            _ => Err(SyncError::invalid_response(AUK_SOURCE, "missing Items array")),
        },
        _ => Err(SyncError::invalid_response(AUK_SOURCE, "expected a JSON object")),
    }
}

pub fn clean_brevets(items: Vec<serde_json::Value>) -> Vec<Brevet> {
    items
        .into_iter()
        .filter_map(|value| {
            let item: AukItem = match serde_json::from_value(value.clone()) {
                Ok(item) => item,
                Err(e) => {
                    debug!("Skipping malformed AUK item: {}", e);
                    return None;
                }
            };
            if item.is_cancelled {
                debug!(title = ?item.title, "Skipping cancelled AUK event");
                return None;
            }
            let Some(date_number) = parse_event_date(&item.event_date_formatted) else {
                debug!("Skipping AUK item with unparseable date '{}'", item.event_date_formatted);
                return None;
            };
            let date = date_number_to_display(date_number);
            let start = item.start_condition.trim();
            let city = format!("{} {}", start, item.start_address_description)
                .replace(" ,", ",")
                .trim()
                .to_string();
            let distance = item.award_distance.and_then(exact_distance);

            let mut brevet = Brevet::new(
                identity_key(&date, distance, COUNTRY, &identity_safe(start)),
                date_number,
                value,
            );
            brevet.name = item.title.as_deref().and_then(non_empty);
            brevet.distance = distance;
            brevet.country = Some(COUNTRY.to_string());
            brevet.city = non_empty(&city);
            brevet.geoloc = GeoPoint::from_parts(item.start_latitude, item.start_longitude)
                .into_iter()
                .collect();
            brevet.site = absolute_url(AUK_EVENT_BASE_URL, item.url.as_deref().unwrap_or(""))
                .or_else(|| Some(AUK_EVENT_BASE_URL.to_string()));
            brevet.club = item.body.as_deref().and_then(non_empty);
            brevet.ascent = Some(item.climb.unwrap_or(0));
            Some(brevet)
        })
        .collect()
}

#[async_trait::async_trait]
impl BrevetSource for AukSource {
    fn name(&self) -> &'static str {
        AUK_SOURCE
    }

    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<Vec<Brevet>> {
        info!("Fetching AUK brevets");
        let response = self.client.get(AUK_SEARCH_URL).send().await?;
        let body: serde_json::Value = check_ok(response, AUK_SOURCE)?.json().await?;

        let brevets = clean_brevets(extract_items(body)?);
        info!("Mapped {} AUK brevets", brevets.len());
        Ok(brevets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_date_formats() {
        assert_eq!(parse_event_date("2025-03-08T00:00:00"), Some(20250308));
        assert_eq!(parse_event_date("Sat 08 Mar 2025"), Some(20250308));
        assert_eq!(parse_event_date("08/03/2025"), Some(20250308));
        assert_eq!(parse_event_date("soon"), None);
    }

    #[test]
    fn test_envelope_required() {
        assert!(extract_items(json!([])).is_err());
        assert!(extract_items(json!({"Items": {}})).is_err());
        assert_eq!(extract_items(json!({"Items": [1]})).unwrap().len(), 1);
    }

    #[test]
    fn test_clean_filters_cancelled() {
        let items = vec![
            json!({
                "StartCondition": "Bishop's Stortford ",
                "StartAddressDescription": ", Village Hall",
                "EventDateFormatted": "2025-03-08T00:00:00",
                "AwardDistance": 200,
                "ActualDistance": 207,
                "Title": "The Horseshoe Pass",
                "IsCancelled": false,
                "StartLatitude": 51.87,
                "StartLongitude": 0.16,
                "Body": "Audax Club Bristol",
                "Url": "12345-horseshoe"
            }),
            json!({
                "StartCondition": "York",
                "EventDateFormatted": "2025-03-09T00:00:00",
                "AwardDistance": 100,
                "IsCancelled": true
            }),
        ];

        let brevets = clean_brevets(items);

        assert_eq!(brevets.len(), 1);
        let b = &brevets[0];
        assert_eq!(b.object_id, "08/03/2025__200__UK__Bishop_s_Stortford");
        assert_eq!(b.city.as_deref(), Some("Bishop's Stortford, Village Hall"));
        assert_eq!(b.coordinates(), Some(GeoPoint { lat: 51.87, lng: 0.16 }));
        assert_eq!(b.site.as_deref(), Some("https://www.audax.uk/event-details/12345-horseshoe"));
        assert_eq!(b.ascent, Some(0));
    }
}
