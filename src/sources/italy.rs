use crate::constants::{ITALY_SITE_URL, ITALY_SOURCE, ITALY_XLSX_URL};
use crate::date::{date_number_to_display, parse_loose_date};
use crate::error::Result;
use crate::http::check_ok;
use crate::identity::identity_key;
use crate::sources::fields::{exact_distance, leading_int, non_empty, starts_with_digit};
use crate::sources::spreadsheet::{column, sheet_rows, SheetRow};
use crate::types::{Brevet, BrevetSource};
use tracing::{debug, info, instrument};

const COUNTRY: &str = "Italy";

pub struct ItalySource {
    client: reqwest::Client,
}

impl ItalySource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Map Audax Italia calendar rows (`DATA`, `DISTANZA`, `COMUNE`, ...) to brevets.
pub fn clean_brevets(rows: Vec<SheetRow>) -> Vec<Brevet> {
    rows.into_iter()
        .filter(|row| starts_with_digit(column(row, "DATA")))
        .filter_map(|row| {
            let Some(date_number) = parse_loose_date(column(&row, "DATA")) else {
                debug!("Skipping Audax Italia row with unparseable date '{}'", column(&row, "DATA"));
                return None;
            };
            let date = date_number_to_display(date_number);
            let distance = leading_int(column(&row, "DISTANZA"))
                .filter(|km| *km > 0)
                .and_then(exact_distance);
            let comune = column(&row, "COMUNE").to_string();

            let mut brevet = Brevet::new(
                identity_key(&date, distance, COUNTRY, &comune),
                date_number,
                serde_json::to_value(&row).unwrap_or_default(),
            );
            brevet.name = non_empty(column(&row, "MANIFESTAZIONE"));
            brevet.distance = distance;
            brevet.country = Some(COUNTRY.to_string());
            brevet.region = non_empty(column(&row, "REGIONE"));
            brevet.city = non_empty(&comune);
            brevet.site = Some(ITALY_SITE_URL.to_string());
            brevet.club = non_empty(column(&row, "ORGANIZZATORE"));
            brevet.ascent = Some(0);
            Some(brevet)
        })
        .collect()
}

#[async_trait::async_trait]
impl BrevetSource for ItalySource {
    fn name(&self) -> &'static str {
        ITALY_SOURCE
    }

    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<Vec<Brevet>> {
        info!("Downloading Audax Italia workbook");
        let response = self.client.get(ITALY_XLSX_URL).send().await?;
        let bytes = check_ok(response, ITALY_SOURCE)?.bytes().await?;

        let brevets = clean_brevets(sheet_rows(&bytes)?);
        info!("Mapped {} Audax Italia brevets", brevets.len());
        Ok(brevets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> SheetRow {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_clean_rows() {
        let rows = vec![
            row(&[("DATA", "CALENDARIO 2025")]),
            row(&[
                ("DATA", "06/04/2025"),
                ("DISTANZA", "210"),
                ("MANIFESTAZIONE", "Giro dei Colli"),
                ("ORGANIZZATORE", "ASD Audax Padova"),
                ("REGIONE", "Veneto"),
                ("COMUNE", "Padova"),
            ]),
            row(&[("DATA", "2025-05-01"), ("DISTANZA", ""), ("COMUNE", "Roma")]),
        ];

        let brevets = clean_brevets(rows);

        assert_eq!(brevets.len(), 2);
        let b = &brevets[0];
        assert_eq!(b.object_id, "06/04/2025__210__Italy__Padova");
        assert_eq!(b.date_number, 20250406);
        assert_eq!(b.club.as_deref(), Some("ASD Audax Padova"));
        assert_eq!(b.mail, None);
        assert_eq!(brevets[1].distance, None);
        assert_eq!(brevets[1].object_id, "01/05/2025____Italy__Roma");
    }
}
