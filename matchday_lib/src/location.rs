use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A position report from a supporter's phone, tagged with the club they follow.
/// Rows are written by an external collector and only ever read here.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LocationObservation {
    #[serde(rename = "J_league_id")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "J_league_id"))]
    pub j_league_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    pub favorite_club: String,
}

mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S: Serializer>(timestamp: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&timestamp.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn observation() -> LocationObservation {
        LocationObservation {
            j_league_id: "J-000123".into(),
            latitude: 35.59,
            longitude: 139.44,
            accuracy: 12.5,
            timestamp: NaiveDate::from_ymd_opt(2024, 11, 9).unwrap().and_hms_opt(13, 5, 9).unwrap(),
            favorite_club: "FC町田ゼルビア".into(),
        }
    }

    #[test]
    fn timestamp_uses_plain_datetime_format() {
        let json = serde_json::to_value(observation()).unwrap();
        assert_eq!(json["timestamp"], "2024-11-09 13:05:09");
        assert_eq!(json["J_league_id"], "J-000123");
        assert_eq!(json["favorite_club"], "FC町田ゼルビア");
    }

    #[test]
    fn iso_timestamps_are_rejected() {
        let mut json = serde_json::to_value(observation()).unwrap();
        json["timestamp"] = "2024-11-09T13:05:09Z".into();
        assert!(serde_json::from_value::<LocationObservation>(json).is_err());
    }
}
