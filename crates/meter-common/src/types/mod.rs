//! Common types used across meter

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Column order of the flat record export
pub const CSV_COLUMNS: [&str; 7] = [
    "id",
    "device_id",
    "timestamp",
    "temperature",
    "humidity",
    "pressure",
    "battery_level",
];

/// Timestamp layout used on the wire and in exports
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A single synthetic device reading
///
/// `id` is stable for a given generation index, so two datasets generated
/// with the same count can be compared record by record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: String,
    pub device_id: String,
    pub timestamp: NaiveDateTime,
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub battery_level: f64,
}

impl Measurement {
    /// Render the record as export cells, in `CSV_COLUMNS` order
    pub fn to_row(&self) -> [String; 7] {
        [
            self.id.clone(),
            self.device_id.clone(),
            self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            self.temperature.to_string(),
            self.humidity.to_string(),
            self.pressure.to_string(),
            self.battery_level.to_string(),
        ]
    }
}

/// Page-based pagination envelope returned by `/measurements/page`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageEnvelope<T> {
    /// Records of the requested window, in dataset order
    pub items: Vec<T>,

    /// Length of the whole dataset
    pub total: u32,

    /// Requested page number (1-indexed)
    pub page: u32,

    /// Requested page size
    pub size: u32,

    /// Number of pages the dataset spans at this size
    #[serde(alias = "total_pages")]
    pub pages: u32,

    /// Explicit end-of-data flag; absent means "infer from page length"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,

    /// Seconds the caller should wait before asking again
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff: Option<u64>,
}

impl<T> PageEnvelope<T> {
    /// Whether this page ends the dataset for a caller that asked for
    /// `requested_size` items
    pub fn is_last(&self, requested_size: u32) -> bool {
        self.has_more == Some(false) || self.items.len() < requested_size as usize
    }
}

/// Query-string form of a page request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    pub total: u32,
    pub page: u32,
    pub size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> Measurement {
        Measurement {
            id: "a".to_string(),
            device_id: "device_1".to_string(),
            timestamp: NaiveDate::from_ymd_opt(2025, 6, 18)
                .unwrap()
                .and_hms_opt(13, 7, 0)
                .unwrap(),
            temperature: 21.5,
            humidity: 40.25,
            pressure: 1001.0,
            battery_level: 99.99,
        }
    }

    #[test]
    fn test_timestamp_wire_format() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["timestamp"], "2025-06-18T13:07:00");
    }

    #[test]
    fn test_row_follows_column_order() {
        let row = sample().to_row();
        assert_eq!(row[0], "a");
        assert_eq!(row[1], "device_1");
        assert_eq!(row[2], "2025-06-18T13:07:00");
        assert_eq!(row[6], "99.99");
    }

    #[test]
    fn test_envelope_accepts_total_pages_alias() {
        let body = r#"{"items":[],"total":3,"page":1,"size":10,"total_pages":1}"#;
        let envelope: PageEnvelope<Measurement> = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.pages, 1);
        assert_eq!(envelope.has_more, None);
        assert_eq!(envelope.backoff, None);
    }

    #[test]
    fn test_envelope_omits_absent_hints() {
        let envelope: PageEnvelope<Measurement> = PageEnvelope {
            items: vec![],
            total: 0,
            page: 1,
            size: 10,
            pages: 0,
            has_more: None,
            backoff: None,
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert!(json.get("has_more").is_none());
        assert!(json.get("backoff").is_none());
    }

    #[test]
    fn test_is_last() {
        let mut envelope = PageEnvelope {
            items: vec![sample(); 10],
            total: 25,
            page: 1,
            size: 10,
            pages: 3,
            has_more: None,
            backoff: None,
        };
        assert!(!envelope.is_last(10));

        envelope.has_more = Some(false);
        assert!(envelope.is_last(10));

        envelope.has_more = None;
        envelope.items.truncate(5);
        assert!(envelope.is_last(10));
    }
}
