use crate::date::{date_number_to_display, date_number_to_epoch_seconds, DateNumber};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Untouched provider record, kept on every brevet for audit
pub type RawEventData = serde_json::Value;

/// A single coordinate pair, in the shape the search index expects for `_geoloc`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// `(0, 0)` and missing halves are what providers send when they know nothing
    pub fn from_parts(lat: Option<f64>, lng: Option<f64>) -> Option<Self> {
        match (lat, lng) {
            (Some(lat), Some(lng)) if lat != 0.0 && lng != 0.0 => Some(Self { lat, lng }),
            _ => None,
        }
    }
}

/// The canonical brevet record shared by every source.
///
/// Field names on the wire follow the search index schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brevet {
    #[serde(rename = "objectID")]
    pub object_id: String,
    pub date: String,
    #[serde(rename = "dateNumber")]
    pub date_number: DateNumber,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(rename = "_geoloc", default)]
    pub geoloc: Vec<GeoPoint>,
    #[serde(default)]
    pub map: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub club: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ascent: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub meta: RawEventData,
}

impl Brevet {
    /// A brevet with the date fields filled in and everything else empty.
    pub fn new(object_id: String, date_number: DateNumber, meta: RawEventData) -> Self {
        Self {
            object_id,
            date: date_number_to_display(date_number),
            date_number,
            distance: None,
            name: None,
            country: None,
            region: None,
            department: None,
            city: None,
            geoloc: Vec::new(),
            map: Vec::new(),
            site: None,
            mail: None,
            club: None,
            ascent: None,
            time: date_number_to_epoch_seconds(date_number),
            status: None,
            meta,
        }
    }

    pub fn coordinates(&self) -> Option<GeoPoint> {
        self.geoloc.first().copied()
    }

    pub fn has_coordinates(&self) -> bool {
        !self.geoloc.is_empty()
    }

    /// Fill in coordinates; a brevet that already has some keeps them.
    pub fn set_coordinates(&mut self, point: GeoPoint) -> bool {
        if self.has_coordinates() {
            return false;
        }
        self.geoloc = vec![point];
        true
    }
}

/// Core trait that all brevet calendars must implement
#[async_trait::async_trait]
pub trait BrevetSource: Send + Sync {
    /// Unique identifier for this source
    fn name(&self) -> &'static str;

    /// Fetch the provider calendar and map every usable row to a [`Brevet`]
    async fn fetch(&self) -> Result<Vec<Brevet>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serializes_index_field_names() {
        let mut brevet = Brevet::new("15/03/2024__200__France__Paris".into(), 20240315, json!({}));
        brevet.distance = Some(200);
        let value = serde_json::to_value(&brevet).unwrap();

        assert_eq!(value["objectID"], "15/03/2024__200__France__Paris");
        assert_eq!(value["dateNumber"], 20240315);
        assert_eq!(value["date"], "15/03/2024");
        assert_eq!(value["_geoloc"], json!([]));
        assert_eq!(value["time"], 1_710_460_800);
        assert!(value.get("name").is_none());
    }

    #[test]
    fn test_coordinates_are_never_overwritten() {
        let mut brevet = Brevet::new("x".into(), 20240315, json!({}));
        assert!(brevet.set_coordinates(GeoPoint { lat: 1.0, lng: 2.0 }));
        assert!(!brevet.set_coordinates(GeoPoint { lat: 3.0, lng: 4.0 }));
        assert_eq!(brevet.coordinates(), Some(GeoPoint { lat: 1.0, lng: 2.0 }));
    }

    #[test]
    fn test_zero_coordinates_mean_unknown() {
        assert_eq!(GeoPoint::from_parts(Some(0.0), Some(0.0)), None);
        assert_eq!(GeoPoint::from_parts(Some(51.5), None), None);
        assert!(GeoPoint::from_parts(Some(51.5), Some(-0.1)).is_some());
    }
}
