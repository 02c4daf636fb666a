//! Raw JSON to domain entity mapping.
//!
//! Every function here is total: missing strings become `""`, missing
//! numbers become `0`, and anything that cannot be defaulted (ids,
//! timestamps) yields a [`MappingError`] rather than a panic or a silent
//! epoch value.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use super::model::{
    Alarm, JobEvent, JobState, Manifest, ServerStatus, ServiceJob, UNKNOWN_SMRT_LINK_VERSION,
};
use crate::error::MappingError;

/// Map `GET status`.
pub fn map_status(json: &Value) -> ServerStatus {
    ServerStatus {
        instance_id: string_or_empty(json, "id"),
        uuid: string_or_empty(json, "uuid"),
        service_version: string_or_empty(json, "version"),
        system_version: None,
        uptime_millis: u64_or_zero(json, "uptime"),
        status_code: string_or_empty(json, "status"),
        message: string_or_empty(json, "message"),
    }
}

/// Map one job record.
///
/// The wire field for the SMRT Link version is `smrtlinkVersion` (lowercase
/// `l`); it maps onto [`ServiceJob::smrt_link_version`].
pub fn map_job(json: &Value) -> Result<ServiceJob, MappingError> {
    let id = required_i64(json, "id")?;
    let created_at = required_timestamp(json, "createdAt")?;
    let updated_at = required_timestamp(json, "updatedAt")?;

    Ok(ServiceJob {
        id,
        name: string_or_empty(json, "name"),
        job_type_id: string_or_empty(json, "jobTypeId"),
        state: JobState::from(string_or_empty(json, "state")),
        created_at,
        updated_at,
        run_time_secs: run_time_secs(created_at, updated_at),
        smrt_link_version: normalize_version(
            optional_string(json, "smrtlinkVersion").as_deref(),
            UNKNOWN_SMRT_LINK_VERSION,
        ),
        created_by: optional_string(json, "createdBy"),
        path: optional_string(json, "path"),
        error_message: optional_string(json, "errorMessage"),
    })
}

pub fn map_jobs(json: &Value) -> Result<Vec<ServiceJob>, MappingError> {
    map_list(json, map_job)
}

/// Map one alarm. The wire id field is `alarmId`.
pub fn map_alarm(json: &Value) -> Result<Alarm, MappingError> {
    Ok(Alarm {
        id: string_or_empty(json, "alarmId"),
        name: string_or_empty(json, "name"),
        state: string_or_empty(json, "state"),
        updated_at: required_timestamp(json, "updatedAt")?,
        message: optional_string(json, "message"),
    })
}

pub fn map_alarms(json: &Value) -> Result<Vec<Alarm>, MappingError> {
    map_list(json, map_alarm)
}

pub fn map_event(json: &Value) -> Result<JobEvent, MappingError> {
    Ok(JobEvent {
        job_id: i64_or_zero(json, "jobId"),
        state: JobState::from(string_or_empty(json, "state")),
        event_id: string_or_empty(json, "eventId"),
        event_type_id: string_or_empty(json, "eventTypeId"),
        created_at: required_timestamp(json, "createdAt")?,
        message: string_or_empty(json, "message"),
    })
}

pub fn map_events(json: &Value) -> Result<Vec<JobEvent>, MappingError> {
    map_list(json, map_event)
}

pub fn map_manifests(json: &Value) -> Result<Vec<Manifest>, MappingError> {
    map_list(json, |m| {
        Ok(Manifest {
            id: string_or_empty(m, "id"),
            version: string_or_empty(m, "version"),
        })
    })
}

/// Trimmed version string, or `default` when absent or blank.
pub fn normalize_version(raw: Option<&str>, default: &str) -> String {
    match raw.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}

/// Seconds between two timestamps, clamped at zero.
pub fn run_time_secs(created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> f64 {
    let millis = (updated_at - created_at).num_milliseconds().max(0);
    millis as f64 / 1000.0
}

/// Parse an ISO-8601 timestamp. Values without an offset are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // ISO-8601 basic offsets: `-0800` and hour-only `-08`.
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn map_list<T>(
    json: &Value,
    f: impl Fn(&Value) -> Result<T, MappingError>,
) -> Result<Vec<T>, MappingError> {
    let items = json
        .as_array()
        .ok_or_else(|| MappingError::new("<root>", "expected a JSON array"))?;
    items.iter().map(f).collect()
}

fn string_or_empty(json: &Value, key: &str) -> String {
    optional_string(json, key).unwrap_or_default()
}

fn optional_string(json: &Value, key: &str) -> Option<String> {
    match json.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn u64_or_zero(json: &Value, key: &str) -> u64 {
    match json.get(key) {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn i64_or_zero(json: &Value, key: &str) -> i64 {
    parse_i64(json.get(key)).unwrap_or(0)
}

fn parse_i64(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn required_i64(json: &Value, key: &str) -> Result<i64, MappingError> {
    match json.get(key) {
        None | Some(Value::Null) => Err(MappingError::new(key, "missing required field")),
        value => parse_i64(value).ok_or_else(|| MappingError::new(key, "expected an integer")),
    }
}

fn required_timestamp(json: &Value, key: &str) -> Result<DateTime<Utc>, MappingError> {
    match json.get(key) {
        None | Some(Value::Null) => Err(MappingError::new(key, "missing required field")),
        Some(Value::String(s)) => parse_timestamp(s).ok_or_else(|| {
            MappingError::new(key, format!("'{}' is not an ISO-8601 timestamp", s))
        }),
        Some(_) => Err(MappingError::new(key, "expected an ISO-8601 string")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn job_json() -> Value {
        json!({
            "id": 1234,
            "uuid": "b9c5f6e0-0000-4000-8000-000000000001",
            "name": "Lambda Resequencing",
            "jobTypeId": "pbsmrtpipe",
            "state": "SUCCESSFUL",
            "createdAt": "2017-03-08T08:00:00.000-08:00",
            "updatedAt": "2017-03-08T08:02:30.500-08:00",
            "smrtlinkVersion": "5.0.0.6792",
            "createdBy": "admin",
            "path": "/opt/smrtlink/jobs-root/000/001234"
        })
    }

    #[test]
    fn test_map_status_defaults_missing_fields() {
        let status = map_status(&json!({
            "id": "smrtlink-alpha",
            "version": "0.1.9",
            "status": "OK"
        }));
        assert_eq!(status.instance_id, "smrtlink-alpha");
        assert_eq!(status.service_version, "0.1.9");
        assert_eq!(status.status_code, "OK");
        assert_eq!(status.uuid, "");
        assert_eq!(status.message, "");
        assert_eq!(status.uptime_millis, 0);
        assert!(status.system_version.is_none());

        let empty = map_status(&json!(null));
        assert_eq!(empty.instance_id, "");
        assert_eq!(empty.uptime_millis, 0);
    }

    #[test]
    fn test_map_job() {
        let job = map_job(&job_json()).unwrap();
        assert_eq!(job.id, 1234);
        assert_eq!(job.state, JobState::Successful);
        assert_eq!(job.job_type_id, "pbsmrtpipe");
        assert_eq!(job.run_time_secs, 150.5);
        assert_eq!(job.smrt_link_version, "5.0.0.6792");
        assert_eq!(job.created_by.as_deref(), Some("admin"));
        assert!(job.error_message.is_none());
        assert_eq!(
            job.created_at,
            Utc.with_ymd_and_hms(2017, 3, 8, 16, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_map_job_null_version_uses_sentinel() {
        let mut raw = job_json();
        raw["smrtlinkVersion"] = Value::Null;
        assert_eq!(map_job(&raw).unwrap().smrt_link_version, "UNKNOWN");

        // The camel-cased attribute name is not the wire name.
        raw["smrtLinkVersion"] = json!("9.9.9");
        assert_eq!(map_job(&raw).unwrap().smrt_link_version, "UNKNOWN");
    }

    #[test]
    fn test_map_job_negative_run_time_clamps_to_zero() {
        let mut raw = job_json();
        raw["updatedAt"] = json!("2017-03-08T07:00:00-08:00");
        assert_eq!(map_job(&raw).unwrap().run_time_secs, 0.0);
    }

    #[test]
    fn test_map_job_invalid_date_is_mapping_error() {
        let mut raw = job_json();
        raw["createdAt"] = json!("yesterday");
        let err = map_job(&raw).unwrap_err();
        assert_eq!(err.field, "createdAt");

        let mut raw = job_json();
        raw.as_object_mut().unwrap().remove("updatedAt");
        let err = map_job(&raw).unwrap_err();
        assert_eq!(err.field, "updatedAt");
        assert_eq!(err.reason, "missing required field");
    }

    #[test]
    fn test_map_job_requires_id() {
        let mut raw = job_json();
        raw["id"] = json!("abc");
        assert_eq!(map_job(&raw).unwrap_err().field, "id");

        raw["id"] = json!("42");
        assert_eq!(map_job(&raw).unwrap().id, 42);
    }

    #[test]
    fn test_map_jobs_requires_array() {
        assert!(map_jobs(&json!({"id": 1})).is_err());
        assert!(map_jobs(&json!([])).unwrap().is_empty());

        // One bad record fails the whole listing.
        let bad = json!([job_json(), {"id": 2}]);
        assert!(map_jobs(&bad).is_err());
    }

    #[test]
    fn test_map_alarm() {
        let alarm = map_alarm(&json!({
            "alarmId": "smrtlink.alarms.tmp_dir",
            "name": "Temp Directory",
            "state": "WARN",
            "updatedAt": "2017-03-08T08:00:00Z",
            "message": "Disk 91% full"
        }))
        .unwrap();
        assert_eq!(alarm.id, "smrtlink.alarms.tmp_dir");
        assert_eq!(alarm.state, "WARN");
        assert_eq!(alarm.message.as_deref(), Some("Disk 91% full"));

        assert!(map_alarm(&json!({"alarmId": "x"})).is_err());
    }

    #[test]
    fn test_map_event() {
        let event = map_event(&json!({
            "eventId": "e-1",
            "jobId": 7,
            "state": "RUNNING",
            "eventTypeId": "smrtlink_job_change_state",
            "createdAt": "2017-03-08T08:00:00",
            "message": "Updating state to RUNNING"
        }))
        .unwrap();
        assert_eq!(event.job_id, 7);
        assert_eq!(event.state, JobState::Running);
        assert_eq!(
            event.created_at,
            Utc.with_ymd_and_hms(2017, 3, 8, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_map_manifests() {
        let manifests = map_manifests(&json!([
            {"id": "smrtlink", "version": "5.0.0"},
            {"id": "smrttools"}
        ]))
        .unwrap();
        assert_eq!(manifests.len(), 2);
        assert_eq!(manifests[1].version, "");
    }

    #[test]
    fn test_normalize_version() {
        assert_eq!(normalize_version(Some(" 5.0.0 "), "Unknown"), "5.0.0");
        assert_eq!(normalize_version(Some("  "), "Unknown"), "Unknown");
        assert_eq!(normalize_version(None, "UNKNOWN"), "UNKNOWN");
    }

    #[test]
    fn test_parse_timestamp_forms() {
        assert!(parse_timestamp("2017-03-08T08:00:00.123Z").is_some());
        assert!(parse_timestamp("2017-03-08T08:00:00+02:00").is_some());
        assert!(parse_timestamp("2017-03-08").is_some());
        assert!(parse_timestamp("03/08/2017").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_parse_timestamp_basic_offsets() {
        let expected = Utc.with_ymd_and_hms(2017, 3, 8, 16, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2017-03-08T08:00:00.000-08:00"), Some(expected));
        assert_eq!(parse_timestamp("2017-03-08T08:00:00.000-0800"), Some(expected));
        assert_eq!(parse_timestamp("2017-03-08T08:00:00-0800"), Some(expected));
        assert_eq!(parse_timestamp("2017-03-08T08:00:00-08"), Some(expected));
        assert_eq!(
            parse_timestamp("2017-03-08T17:30:00+0130"),
            Some(Utc.with_ymd_and_hms(2017, 3, 8, 16, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_listing_with_basic_offsets_maps() {
        let listing = json!([
            {"id": 1, "state": "FAILED", "createdAt": "2017-03-08T08:00:00.000-0800", "updatedAt": "2017-03-08T09:00:00.000-0800"},
            {"id": 2, "state": "RUNNING", "createdAt": "2017-03-08T08:00:00-08", "updatedAt": "2017-03-08T08:30:00-08"}
        ]);
        let jobs = map_jobs(&listing).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].created_at, Utc.with_ymd_and_hms(2017, 3, 8, 16, 0, 0).unwrap());
        assert_eq!(jobs[0].run_time_secs, 3600.0);
        assert_eq!(jobs[1].run_time_secs, 1800.0);
    }
}
