use crate::constants::{NETHERLANDS_EVENTS_URL, NETHERLANDS_SOURCE};
use crate::date::date_number_to_display;
use crate::error::Result;
use crate::identity::identity_key;
use crate::sources::fields::{decode_entities, leading_int, non_empty, non_empty_opt};
use crate::sources::tribe::{fetch_all_events, DateDetails, TribeWindow};
use crate::types::{Brevet, BrevetSource};
use serde::Deserialize;
use tracing::{debug, info, instrument};

const COUNTRY: &str = "The Netherlands";

/// Longest description kept in `meta`; some posts embed whole route books
const MAX_DESCRIPTION_CHARS: usize = 10_000;

#[derive(Debug, Clone, Deserialize)]
struct Tag {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Organizer {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    organizer: Option<String>,
}

/// Event of the randonneurs.nl calendar
#[derive(Debug, Clone, Deserialize)]
struct NetherlandsEvent {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    start_date_details: DateDetails,
    #[serde(default)]
    tags: Vec<Tag>,
    // An object when set, `[]` when the post has no venue
    #[serde(default)]
    venue: serde_json::Value,
    // Likewise `[]` or a list of organizer objects
    #[serde(default)]
    organizer: serde_json::Value,
}

pub struct NetherlandsSource {
    client: reqwest::Client,
    window: TribeWindow,
}

impl NetherlandsSource {
    pub fn new(client: reqwest::Client, window: TribeWindow) -> Self {
        Self { client, window }
    }
}

/// Distance tag: numeric and a whole hundred (`200`, not the year tag `2024`).
fn distance_from_tags(tags: &[Tag]) -> u32 {
    tags.iter()
        .filter(|t| t.name.ends_with("00"))
        .find_map(|t| leading_int(&t.name))
        .and_then(|km| u32::try_from(km).ok())
        .unwrap_or(0)
}

fn first_organizer(value: &serde_json::Value) -> Organizer {
    value
        .as_array()
        .and_then(|list| list.first())
        .and_then(|o| serde_json::from_value(o.clone()).ok())
        .unwrap_or_default()
}

fn truncate_description(mut value: serde_json::Value) -> serde_json::Value {
    if let Some(desc) = value.get("description").and_then(|d| d.as_str()) {
        if desc.chars().count() > MAX_DESCRIPTION_CHARS {
            let short: String = desc.chars().take(MAX_DESCRIPTION_CHARS).collect();
            value["description"] = serde_json::Value::String(short);
        }
    }
    value
}

pub fn clean_brevets(events: Vec<serde_json::Value>) -> Vec<Brevet> {
    events
        .into_iter()
        .filter_map(|value| {
            let event: NetherlandsEvent = match serde_json::from_value(value.clone()) {
                Ok(event) => event,
                Err(e) => {
                    debug!("Skipping malformed Netherlands event: {}", e);
                    return None;
                }
            };
            let Some(date_number) = event.start_date_details.date_number() else {
                debug!(title = %event.title, "Skipping Netherlands event without start date");
                return None;
            };
            let date = date_number_to_display(date_number);
            let distance = distance_from_tags(&event.tags);
            let city = event
                .venue
                .get("city")
                .and_then(|c| c.as_str())
                .unwrap_or("")
                .trim()
                .to_string();
            let organizer = first_organizer(&event.organizer);

            let mut brevet = Brevet::new(
                identity_key(&date, Some(distance), COUNTRY, &city),
                date_number,
                truncate_description(value),
            );
            brevet.name = non_empty(&decode_entities(&event.title));
            brevet.distance = Some(distance);
            brevet.country = Some(COUNTRY.to_string());
            brevet.city = non_empty(&city);
            brevet.site = non_empty_opt(event.url.as_deref());
            brevet.mail = non_empty_opt(organizer.email.as_deref());
            brevet.club = non_empty_opt(organizer.organizer.as_deref());
            brevet.ascent = Some(0);
            Some(brevet)
        })
        .collect()
}

#[async_trait::async_trait]
impl BrevetSource for NetherlandsSource {
    fn name(&self) -> &'static str {
        NETHERLANDS_SOURCE
    }

    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<Vec<Brevet>> {
        info!("Fetching Netherlands brevets");
        let events =
            fetch_all_events(&self.client, NETHERLANDS_EVENTS_URL, &self.window, NETHERLANDS_SOURCE)
                .await?;

        let brevets = clean_brevets(events);
        info!("Mapped {} Netherlands brevets", brevets.len());
        Ok(brevets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clean_event() {
        let long = "x".repeat(MAX_DESCRIPTION_CHARS + 50);
        let event = json!({
            "url": "https://www.randonneurs.nl/event/brm-200-utrecht/",
            "title": "BRM 200 Utrecht &amp; Heuvelrug",
            "description": long,
            "start_date_details": {"year": "2025", "month": "03", "day": "29"},
            "tags": [{"name": "2025"}, {"name": "BRM"}, {"name": "200"}],
            "venue": {"id": 7, "venue": "Station", "city": "Utrecht", "country": "Nederland"},
            "organizer": [{"email": "brm@example.nl", "organizer": "Randonneurs NL"}]
        });

        let brevets = clean_brevets(vec![event]);

        assert_eq!(brevets.len(), 1);
        let b = &brevets[0];
        assert_eq!(b.object_id, "29/03/2025__200__The Netherlands__Utrecht");
        assert_eq!(b.name.as_deref(), Some("BRM 200 Utrecht & Heuvelrug"));
        assert_eq!(b.mail.as_deref(), Some("brm@example.nl"));
        assert_eq!(b.club.as_deref(), Some("Randonneurs NL"));
        assert_eq!(
            b.meta["description"].as_str().unwrap().chars().count(),
            MAX_DESCRIPTION_CHARS
        );
    }

    #[test]
    fn test_missing_venue_and_organizer() {
        let event = json!({
            "title": "Fleche",
            "start_date_details": {"year": "2025", "month": "04", "day": "18"},
            "tags": [{"name": "2025"}],
            "venue": [],
            "organizer": []
        });

        let brevets = clean_brevets(vec![event]);

        assert_eq!(brevets[0].object_id, "18/04/2025__0__The Netherlands__");
        assert_eq!(brevets[0].city, None);
        assert_eq!(brevets[0].mail, None);
    }
}
