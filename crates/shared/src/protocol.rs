use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{
    domain::{FileKind, OutputName, RecordId, UploadedName, VehicleCounts},
    error::ServiceErrorBody,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<UploadedName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<FileKind>,
    #[serde(flatten)]
    pub details: ServiceErrorBody,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<UploadedName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_counts: Option<VehicleCounts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_filename: Option<OutputName>,
    #[serde(flatten)]
    pub details: ServiceErrorBody,
}

/// Query string of the save call. `vehicle_counts` travels as serialized JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveQuery {
    pub filename: String,
    pub output_filename: String,
    pub vehicle_counts: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(flatten)]
    pub details: ServiceErrorBody,
}

/// A persisted detection result as listed by the statistics endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticRecord {
    #[serde(rename = "_id")]
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<FileKind>,
    #[serde(default)]
    pub vehicle_counts: VehicleCounts,
    /// Unparseable timestamps read as `None` instead of failing the record.
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub processed_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
}

/// Accepts naive ISO timestamps as well as offset-qualified ones, which are
/// normalized to UTC.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.naive_utc())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok())
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").ok())
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(Value::as_str).and_then(parse_timestamp))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatisticsListResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Vec<StatisticRecord>,
    #[serde(flatten)]
    pub details: ServiceErrorBody,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatisticResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<StatisticRecord>,
    #[serde(flatten)]
    pub details: ServiceErrorBody,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(flatten)]
    pub details: ServiceErrorBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_detect_body_keeps_detail() {
        let body: DetectResponse =
            serde_json::from_str(r#"{"success":false,"detail":"model unavailable"}"#)
                .expect("detect body");
        assert!(!body.success);
        assert!(body.vehicle_counts.is_none());
        assert_eq!(
            body.details.detail_text().as_deref(),
            Some("model unavailable")
        );
    }

    #[test]
    fn statistic_record_reads_service_document() {
        let record: StatisticRecord = serde_json::from_str(
            r#"{
                "_id": "65a1f0c2e4b0a1b2c3d4e5f6",
                "filename": "20240101_120000_car.jpg",
                "file_type": "jpg",
                "vehicle_counts": {"motorbikes": 1, "cars": 4, "trucks": 0},
                "processed_at": "2024-01-01T12:00:05.123000",
                "output_path": "detected_20240101_120000_car.jpg"
            }"#,
        )
        .expect("record");
        assert_eq!(record.id.as_str(), "65a1f0c2e4b0a1b2c3d4e5f6");
        assert_eq!(record.file_type, Some(FileKind::new("jpg")));
        assert_eq!(record.vehicle_counts, VehicleCounts::new(1, 4, 0));
        assert!(record.processed_at.is_some());
    }

    #[test]
    fn statistic_record_tolerates_offset_timestamp_and_missing_filename() {
        let record: StatisticRecord = serde_json::from_str(
            r#"{
                "_id": "65a1f0c2e4b0a1b2c3d4e5f7",
                "vehicle_counts": {"motorbikes": 0, "cars": 2, "trucks": 1},
                "processed_at": "2024-01-01T14:00:05+02:00"
            }"#,
        )
        .expect("record");
        assert!(record.filename.is_none());
        assert_eq!(
            record.processed_at.map(|at| at.to_string()).as_deref(),
            Some("2024-01-01 12:00:05")
        );
    }

    #[test]
    fn statistics_list_survives_odd_records() {
        let body: StatisticsListResponse = serde_json::from_str(
            r#"{"success": true, "data": [
                {"_id": "a", "filename": "x.jpg", "processed_at": "not a date"},
                {"_id": "b", "filename": "y.mp4", "processed_at": {"$date": 1704110405000}},
                {"_id": "c", "processed_at": "2024-01-01 12:00:05.5"}
            ]}"#,
        )
        .expect("list body");
        assert_eq!(body.data.len(), 3);
        assert!(body.data[0].processed_at.is_none());
        assert!(body.data[1].processed_at.is_none());
        assert!(body.data[2].processed_at.is_some());
        assert!(body.data[2].filename.is_none());
    }
}
