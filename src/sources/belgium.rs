use crate::constants::{BELGIUM_EVENTS_URL, BELGIUM_SOURCE};
use crate::date::date_number_to_display;
use crate::error::Result;
use crate::identity::identity_key;
use crate::sources::fields::{decode_entities, leading_int, non_empty, slug_segment};
use crate::sources::tribe::{fetch_all_events, DateDetails, TribeWindow};
use crate::types::{Brevet, BrevetSource};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::{debug, info, instrument};

static ROUTE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href^="https://www.openrunner"]"#).expect("valid selector"));
static MAILTO_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href^="mailto:"]"#).expect("valid selector"));
static LI_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("li").expect("valid selector"));

const COUNTRY: &str = "Belgium";

#[derive(Debug, Clone, Deserialize)]
struct Category {
    #[serde(default)]
    name: String,
}

/// Event of the randonneurs.be calendar
#[derive(Debug, Clone, Deserialize)]
struct BelgiumEvent {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    slug: String,
    #[serde(default)]
    start_date_details: DateDetails,
    #[serde(default)]
    categories: Vec<Category>,
}

pub struct BelgiumSource {
    client: reqwest::Client,
    window: TribeWindow,
}

impl BelgiumSource {
    pub fn new(client: reqwest::Client, window: TribeWindow) -> Self {
        Self { client, window }
    }
}

/// Distance category: the first numeric category that is not `brm`.
fn distance_from_categories(categories: &[Category]) -> u32 {
    categories
        .iter()
        .filter(|c| c.name != "brm")
        .find_map(|c| leading_int(&c.name))
        .and_then(|km| u32::try_from(km).ok())
        .unwrap_or(0)
}

/// Contact details buried in the description HTML
#[derive(Debug, Default, PartialEq)]
pub struct DescriptionDetails {
    pub routes: Vec<String>,
    pub mail: String,
    pub club: String,
}

/// Route links, organizer mail and club name out of the description.
///
/// The club is the first list item of the block that holds the `mailto:` link.
pub fn parse_description(html: &str) -> DescriptionDetails {
    let fragment = Html::parse_fragment(html);
    let routes = fragment
        .select(&ROUTE_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .map(str::to_string)
        .collect();

    let mailto = fragment.select(&MAILTO_SELECTOR).next();
    let mail = mailto
        .and_then(|a| a.value().attr("href"))
        .map(|h| h.replacen("mailto:", "", 1))
        .unwrap_or_default();
    let club = mailto
        .and_then(|a| a.parent())
        .and_then(|p| p.parent())
        .and_then(ElementRef::wrap)
        .and_then(|block| block.select(&LI_SELECTOR).next())
        .map(|li| li.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    DescriptionDetails { routes, mail, club }
}

pub fn clean_brevets(events: Vec<serde_json::Value>) -> Vec<Brevet> {
    events
        .into_iter()
        .filter_map(|value| {
            let event: BelgiumEvent = match serde_json::from_value(value.clone()) {
                Ok(event) => event,
                Err(e) => {
                    debug!("Skipping malformed Belgium event: {}", e);
                    return None;
                }
            };
            let Some(date_number) = event.start_date_details.date_number() else {
                debug!(slug = %event.slug, "Skipping Belgium event without start date");
                return None;
            };
            let date = date_number_to_display(date_number);
            let distance = distance_from_categories(&event.categories);
            // 2025-brm-500-oudenburg
            let city = slug_segment(&event.slug, 3).unwrap_or_default();
            let details = parse_description(&event.description);

            let mut brevet = Brevet::new(
                identity_key(&date, Some(distance), COUNTRY, &city),
                date_number,
                value,
            );
            brevet.name = non_empty(&decode_entities(&event.title));
            brevet.distance = Some(distance);
            brevet.country = Some(COUNTRY.to_string());
            brevet.city = non_empty(&city);
            brevet.map = details.routes;
            brevet.site = event.url.as_deref().and_then(non_empty);
            brevet.mail = non_empty(&details.mail);
            brevet.club = non_empty(&details.club);
            brevet.ascent = Some(0);
            Some(brevet)
        })
        .collect()
}

#[async_trait::async_trait]
impl BrevetSource for BelgiumSource {
    fn name(&self) -> &'static str {
        BELGIUM_SOURCE
    }

    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<Vec<Brevet>> {
        info!("Fetching Belgium brevets");
        let events = fetch_all_events(&self.client, BELGIUM_EVENTS_URL, &self.window, BELGIUM_SOURCE).await?;

        let brevets = clean_brevets(events);
        info!("Mapped {} Belgium brevets", brevets.len());
        Ok(brevets)
    }
}
