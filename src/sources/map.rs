use crate::constants::{MAP_REFERER, MAP_SOURCE, MAP_SUPABASE_URL};
use crate::date::parse_loose_date;
use crate::error::Result;
use crate::http::{check_ok, expect_array};
use crate::identity::native_identity;
use crate::sources::fields::{exact_distance, leading_int, non_empty, non_empty_opt};
use crate::types::{Brevet, BrevetSource, GeoPoint};
use serde::Deserialize;
use tracing::{debug, info, instrument};

/// Identity prefix; the map database has stable ids but ambiguous natural keys
const IDENTITY_PREFIX: &str = "supabase";

/// Row of the ACP map's Supabase `brevets` table
#[derive(Debug, Clone, Deserialize)]
struct MapRow {
    id: i64,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    distance: Option<i64>,
    #[serde(default)]
    date: String,
    #[serde(default)]
    mailorganisateur: Option<String>,
    #[serde(default)]
    maplink: Option<String>,
    #[serde(default)]
    clubwebsite: Option<String>,
    #[serde(default)]
    denivele: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    nom: Option<String>,
    #[serde(default, rename = "nomClub")]
    nom_club: Option<String>,
}

pub struct MapSource {
    client: reqwest::Client,
    api_key: String,
}

impl MapSource {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self { client, api_key }
    }
}

pub fn clean_brevets(rows: Vec<serde_json::Value>) -> Vec<Brevet> {
    rows.into_iter()
        .filter_map(|value| {
            let row: MapRow = match serde_json::from_value(value.clone()) {
                Ok(row) => row,
                Err(e) => {
                    debug!("Skipping malformed map row: {}", e);
                    return None;
                }
            };
            let Some(date_number) = parse_loose_date(&row.date) else {
                debug!(id = row.id, "Skipping map row with unparseable date '{}'", row.date);
                return None;
            };

            let mut brevet = Brevet::new(native_identity(IDENTITY_PREFIX, row.id), date_number, value);
            brevet.distance = row.distance.and_then(exact_distance);
            brevet.country = non_empty_opt(row.country.as_deref());
            brevet.region = non_empty_opt(row.nom.as_deref());
            brevet.department = non_empty_opt(row.city.as_deref());
            brevet.city = non_empty_opt(row.city.as_deref());
            brevet.geoloc = GeoPoint::from_parts(row.latitude, row.longitude)
                .into_iter()
                .collect();
            brevet.map = row.maplink.as_deref().and_then(non_empty).into_iter().collect();
            brevet.site = non_empty_opt(row.clubwebsite.as_deref());
            brevet.mail = non_empty_opt(row.mailorganisateur.as_deref());
            brevet.club = non_empty_opt(row.nom_club.as_deref());
            brevet.ascent = row.denivele.as_deref().and_then(leading_int);
            brevet.status = non_empty_opt(row.status.as_deref());
            Some(brevet)
        })
        .collect()
}

#[async_trait::async_trait]
impl BrevetSource for MapSource {
    fn name(&self) -> &'static str {
        MAP_SOURCE
    }

    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<Vec<Brevet>> {
        info!("Fetching Supabase brevets");
        let response = self
            .client
            .get(MAP_SUPABASE_URL)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::REFERER, MAP_REFERER)
            .send()
            .await?;
        let body: serde_json::Value = check_ok(response, MAP_SOURCE)?.json().await?;
        let rows: Vec<serde_json::Value> = expect_array(body, MAP_SOURCE)?;

        let brevets = clean_brevets(rows);
        info!("Mapped {} map brevets", brevets.len());
        Ok(brevets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_native_identity_and_coordinates() {
        let rows = vec![
            json!({
                "id": 812,
                "created_at": "2024-01-02T10:00:00",
                "city": "Rambouillet",
                "latitude": 48.64,
                "longitude": 1.83,
                "distance": 200,
                "date": "06/04/2024",
                "maplink": "https://www.openrunner.com/r/9",
                "clubwebsite": "https://club.example.fr",
                "mailorganisateur": "orga@example.fr",
                "denivele": "1800 m",
                "country": "France",
                "status": "open",
                "nom": "Ile-de-France",
                "nomClub": "AC Rambouillet"
            }),
            json!({
                "id": 813,
                "city": "Nowhere",
                "latitude": 0,
                "longitude": 0,
                "distance": 300,
                "date": "07/04/2024",
                "maplink": "",
                "denivele": null,
                "country": "France"
            }),
        ];

        let brevets = clean_brevets(rows);

        assert_eq!(brevets.len(), 2);
        assert_eq!(brevets[0].object_id, "supabase__812");
        assert_eq!(brevets[0].date_number, 20240406);
        assert_eq!(brevets[0].region.as_deref(), Some("Ile-de-France"));
        assert_eq!(brevets[0].department.as_deref(), Some("Rambouillet"));
        assert_eq!(brevets[0].ascent, Some(1800));
        assert_eq!(brevets[0].coordinates(), Some(GeoPoint { lat: 48.64, lng: 1.83 }));
        assert_eq!(brevets[0].map, vec!["https://www.openrunner.com/r/9"]);

        assert_eq!(brevets[1].object_id, "supabase__813");
        assert!(brevets[1].geoloc.is_empty());
        assert!(brevets[1].map.is_empty());
        assert_eq!(brevets[1].ascent, None);
    }
}
