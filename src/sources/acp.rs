use crate::constants::{ACP_CALENDAR_URL, ACP_REFERER, ACP_SOURCE};
use crate::date::{date_number_to_display, parse_loose_date};
use crate::error::Result;
use crate::http::{check_ok, expect_array};
use crate::identity::identity_key;
use crate::sources::fields::{exact_distance, non_empty, split_links};
use crate::types::{Brevet, BrevetSource};
use serde::Deserialize;
use tracing::{debug, info, instrument};

/// Row of the Audax Club Parisien BRM calendar API
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct AcpRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Distance")]
    distance: Option<i64>,
    #[serde(rename = "Pays")]
    pays: String,
    #[serde(rename = "Region")]
    region: Option<String>,
    #[serde(rename = "Departement")]
    departement: Option<String>,
    #[serde(rename = "Ville")]
    ville: String,
    #[serde(rename = "RoadMap")]
    road_map: Option<String>,
    #[serde(rename = "SiteWeb")]
    site_web: Option<String>,
    #[serde(rename = "MailContact")]
    mail_contact: Option<String>,
    #[serde(rename = "NomClub")]
    nom_club: Option<String>,
    #[serde(rename = "Denivele")]
    denivele: Option<i64>,
    #[serde(rename = "TimeDate")]
    time_date: Option<i64>,
    #[serde(rename = "Statut")]
    statut: Option<String>,
}

/// Search window sent with the calendar request (`YYYY-MM-DD`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AcpWindow {
    pub from: String,
    pub to: String,
}

pub struct AcpSource {
    client: reqwest::Client,
    window: AcpWindow,
}

impl AcpSource {
    pub fn new(client: reqwest::Client, window: AcpWindow) -> Self {
        Self { client, window }
    }
}

/// The calendar spells some countries in French
pub fn clean_country(pays: &str) -> String {
    match pays.trim() {
        "Allemagne" => "Germany".to_string(),
        "Royaume-Uni" => "UK".to_string(),
        other => other.to_string(),
    }
}

fn is_cancelled(row: &AcpRow) -> bool {
    row.statut
        .as_deref()
        .map(|s| s.to_lowercase().contains("annul"))
        .unwrap_or(false)
}

/// Map raw calendar rows to brevets, skipping cancelled and undated rows.
pub fn clean_brevets(rows: Vec<serde_json::Value>) -> Vec<Brevet> {
    rows.into_iter()
        .filter_map(|value| {
            let row: AcpRow = match serde_json::from_value(value.clone()) {
                Ok(row) => row,
                Err(e) => {
                    debug!("Skipping malformed ACP row: {}", e);
                    return None;
                }
            };
            if is_cancelled(&row) {
                debug!("Skipping cancelled ACP brevet on {}", row.date);
                return None;
            }
            let Some(date_number) = parse_loose_date(&row.date) else {
                debug!("Skipping ACP row with unparseable date '{}'", row.date);
                return None;
            };
            let date = date_number_to_display(date_number);
            let country = clean_country(&row.pays);
            let distance = row.distance.and_then(exact_distance);

            let mut brevet = Brevet::new(
                identity_key(&date, distance, &country, &row.ville),
                date_number,
                value,
            );
            brevet.distance = distance;
            brevet.country = non_empty(&country);
            brevet.region = row.region.as_deref().and_then(non_empty);
            brevet.department = row.departement.as_deref().and_then(non_empty);
            brevet.city = non_empty(&row.ville);
            brevet.map = row.road_map.as_deref().map(split_links).unwrap_or_default();
            brevet.site = row.site_web.as_deref().and_then(non_empty);
            brevet.mail = row.mail_contact.as_deref().and_then(non_empty);
            brevet.club = row.nom_club.as_deref().and_then(non_empty);
            brevet.ascent = row.denivele;
            if let Some(t) = row.time_date.filter(|t| *t > 0) {
                brevet.time = Some(t);
            }
            brevet.status = row.statut.as_deref().and_then(non_empty);
            Some(brevet)
        })
        .collect()
}

#[async_trait::async_trait]
impl BrevetSource for AcpSource {
    fn name(&self) -> &'static str {
        ACP_SOURCE
    }

    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<Vec<Brevet>> {
        info!(from = %self.window.from, to = %self.window.to, "Fetching ACP brevets");
        let form = [
            ("action", "search"),
            ("startdate", self.window.from.as_str()),
            ("enddate", self.window.to.as_str()),
            ("distance", ""),
            ("pays", ""),
            ("region", ""),
            ("departement", ""),
        ];
        let response = self
            .client
            .post(ACP_CALENDAR_URL)
            .header(reqwest::header::REFERER, ACP_REFERER)
            .form(&form)
            .send()
            .await?;
        let body: serde_json::Value = check_ok(response, ACP_SOURCE)?.json().await?;
        let rows: Vec<serde_json::Value> = expect_array(body, ACP_SOURCE)?;

        let brevets = clean_brevets(rows);
        info!("Mapped {} ACP brevets", brevets.len());
        Ok(brevets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(date: &str, pays: &str) -> serde_json::Value {
        json!({
            "Date": date,
            "Distance": 300,
            "Pays": pays,
            "Region": "Bayern",
            "Departement": "",
            "Ville": "Munich",
            "RoadMap": "https://www.openrunner.com/r/1; https://www.openrunner.com/r/2",
            "SiteWeb": "https://example.de",
            "MailContact": "club@example.de",
            "NomClub": "ARA Bayern",
            "Denivele": 2500,
            "TimeDate": 0,
            "Statut": "",
            "Inscription": null
        })
    }

    #[test]
    fn test_clean_country() {
        assert_eq!(clean_country("Allemagne"), "Germany");
        assert_eq!(clean_country("Royaume-Uni"), "UK");
        assert_eq!(clean_country("France"), "France");
    }

    #[test]
    fn test_maps_row() {
        let brevets = clean_brevets(vec![row("04/05/2024", "Allemagne")]);
        assert_eq!(brevets.len(), 1);
        let b = &brevets[0];

        assert_eq!(b.object_id, "04/05/2024__300__Germany__Munich");
        assert_eq!(b.date_number, 20240504);
        assert_eq!(b.distance, Some(300));
        assert_eq!(b.department, None);
        assert_eq!(b.map.len(), 2);
        assert_eq!(b.ascent, Some(2500));
        assert_eq!(b.time, Some(1_714_780_800));
        assert!(b.geoloc.is_empty());
        assert_eq!(b.meta["Pays"], "Allemagne");
    }

    #[test]
    fn test_swapped_month_is_corrected() {
        let brevets = clean_brevets(vec![row("05/18/2024", "France")]);
        assert_eq!(brevets[0].date_number, 20240518);
        assert!(brevets[0].object_id.starts_with("18/05/2024__"));
    }

    #[test]
    fn test_skips_cancelled_and_undated() {
        let mut cancelled = row("04/05/2024", "France");
        cancelled["Statut"] = json!("Annulé");
        let undated = row("", "France");

        assert!(clean_brevets(vec![cancelled, undated]).is_empty());
    }
}
