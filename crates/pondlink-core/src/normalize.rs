// ── Payload normalization ──
//
// The one place untyped telemetry JSON is looked at. Everything past here
// sees `TelemetrySnapshot`. Normalization never fails: absent, null or
// malformed fields read as 0.

use std::num::FpCategory;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::SyncError;
use crate::model::{TelemetrySnapshot, TimeSource, WaterReadings};
use crate::tracker::SyncEvent;

/// Candidate keys for each reading, in precedence order.
const TEMPERATURE_KEYS: &[&str] = &["temperature", "temp"];
const PH_KEYS: &[&str] = &["ph"];
const TDS_KEYS: &[&str] = &["tds"];

/// Turn one received payload into the event the tracker consumes.
pub fn interpret(payload: Option<&Value>, received_at: DateTime<Utc>) -> SyncEvent {
    match payload {
        Some(value) if !is_empty_payload(value) => {
            let (at, source) = derive_timestamp(value, received_at);
            SyncEvent::Update {
                snapshot: normalize_snapshot(value),
                at,
                source,
            }
        }
        _ => SyncEvent::Failed(SyncError::EmptyData),
    }
}

/// Whether a payload counts as "no data": `null` or a falsy scalar.
pub fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_none_or(|f| f.classify() == FpCategory::Zero),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Build a snapshot from `{ water: { temperature|temp, ph, tds } }`.
pub fn normalize_snapshot(payload: &Value) -> TelemetrySnapshot {
    let water = payload.get("water");
    TelemetrySnapshot {
        water: WaterReadings {
            temperature: reading(water, TEMPERATURE_KEYS),
            ph: reading(water, PH_KEYS),
            tds: reading(water, TDS_KEYS),
        },
    }
}

/// The payload's `ts` (epoch millis) when it is a usable positive number,
/// otherwise the receipt time.
pub fn derive_timestamp(payload: &Value, received_at: DateTime<Utc>) -> (DateTime<Utc>, TimeSource) {
    payload
        .get("ts")
        .and_then(device_time)
        .map_or((received_at, TimeSource::Received), |at| (at, TimeSource::Device))
}

/// `ts` goes through the same lenient coercion as the readings, so a
/// numeric string is as good as a number.
fn device_time(ts: &Value) -> Option<DateTime<Utc>> {
    let millis = match ts.as_i64() {
        Some(ms) => ms,
        None => whole_millis(coerce_number(ts))?,
    };
    if millis <= 0 {
        return None;
    }
    DateTime::from_timestamp_millis(millis)
}

/// Beyond ~9e15 ms no date is representable anyway.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn whole_millis(ms: f64) -> Option<i64> {
    let ms = ms.trunc();
    (ms.is_finite() && ms.abs() < 9.0e15).then(|| ms as i64)
}

fn reading(water: Option<&Value>, keys: &[&str]) -> f64 {
    water
        .and_then(|w| keys.iter().find_map(|k| w.get(*k).filter(|v| !v.is_null())))
        .map_or(0.0, coerce_number)
}

/// Lenient numeric coercion: numbers as-is, numeric strings parsed,
/// booleans as 1/0, anything else 0. Non-finite results become 0.
fn coerce_number(value: &Value) -> f64 {
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse::<f64>().unwrap_or(0.0)
            }
        }
        Value::Bool(true) => 1.0,
        _ => 0.0,
    };
    if n.is_finite() { n } else { 0.0 }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_750_000_000_000).unwrap()
    }

    #[test]
    fn temperature_prefers_full_name() {
        let snap = normalize_snapshot(&json!({ "water": { "temperature": 24.5, "temp": 99 } }));
        assert_eq!(snap.water.temperature, 24.5);
    }

    #[test]
    fn temperature_falls_back_to_short_name() {
        let snap = normalize_snapshot(&json!({ "water": { "temp": 5 } }));
        assert_eq!(snap.water.temperature, 5.0);
    }

    #[test]
    fn null_temperature_falls_through() {
        let snap = normalize_snapshot(&json!({ "water": { "temperature": null, "temp": 7 } }));
        assert_eq!(snap.water.temperature, 7.0);
    }

    #[test]
    fn missing_fields_read_as_zero() {
        let snap = normalize_snapshot(&json!({ "water": {} }));
        assert_eq!(snap, TelemetrySnapshot::default());

        let snap = normalize_snapshot(&json!({ "ts": 5 }));
        assert_eq!(snap, TelemetrySnapshot::default());

        let snap = normalize_snapshot(&json!({ "water": "broken" }));
        assert_eq!(snap, TelemetrySnapshot::default());
    }

    #[test]
    fn values_are_coerced() {
        let snap = normalize_snapshot(&json!({
            "water": { "temperature": "26.4", "ph": true, "tds": [1, 2] }
        }));
        assert_eq!(snap.water.temperature, 26.4);
        assert_eq!(snap.water.ph, 1.0);
        assert_eq!(snap.water.tds, 0.0);

        let snap = normalize_snapshot(&json!({ "water": { "ph": "abc", "tds": " 410 " } }));
        assert_eq!(snap.water.ph, 0.0);
        assert_eq!(snap.water.tds, 410.0);
    }

    #[test]
    fn non_finite_strings_read_as_zero() {
        let snap = normalize_snapshot(&json!({ "water": { "ph": "NaN", "tds": "inf" } }));
        assert_eq!(snap.water.ph, 0.0);
        assert_eq!(snap.water.tds, 0.0);
    }

    #[test]
    fn device_timestamp_is_used_exactly() {
        let (at, source) = derive_timestamp(&json!({ "ts": 1_700_000_000_000_i64 }), now());
        assert_eq!(at.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(source, TimeSource::Device);
    }

    #[test]
    fn unusable_timestamps_fall_back_to_receipt() {
        for ts in [json!(0), json!(-1), json!("-5"), json!("soon"), json!(null), json!(1e300)] {
            let (at, source) = derive_timestamp(&json!({ "ts": ts }), now());
            assert_eq!(at, now(), "ts = {ts}");
            assert_eq!(source, TimeSource::Received);
        }
        let (at, _) = derive_timestamp(&json!({ "water": {} }), now());
        assert_eq!(at, now());
    }

    #[test]
    fn numeric_string_timestamp_is_used() {
        let (at, source) = derive_timestamp(&json!({ "ts": "1700000000000" }), now());
        assert_eq!(at.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(source, TimeSource::Device);

        let (at, _) = derive_timestamp(&json!({ "ts": " 1700000000000.9 " }), now());
        assert_eq!(at.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn fractional_timestamp_is_truncated() {
        let (at, source) = derive_timestamp(&json!({ "ts": 1_700_000_000_000.75 }), now());
        assert_eq!(at.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(source, TimeSource::Device);
    }

    #[test]
    fn falsy_payloads_are_empty() {
        for payload in [json!(null), json!(false), json!(0), json!("")] {
            assert!(is_empty_payload(&payload), "{payload}");
        }
        assert!(!is_empty_payload(&json!({})));
        assert!(!is_empty_payload(&json!(1)));
    }

    #[test]
    fn interpret_reports_missing_data() {
        assert_eq!(interpret(None, now()), SyncEvent::Failed(SyncError::EmptyData));
        assert_eq!(
            interpret(Some(&json!(null)), now()),
            SyncEvent::Failed(SyncError::EmptyData)
        );
    }

    #[test]
    fn interpret_builds_update() {
        let event = interpret(
            Some(&json!({ "water": { "temp": 26, "ph": 7.1, "tds": 300 }, "ts": 1_700_000_000_000_i64 })),
            now(),
        );
        match event {
            SyncEvent::Update { snapshot, at, source } => {
                assert_eq!(snapshot.water.temperature, 26.0);
                assert_eq!(at.timestamp_millis(), 1_700_000_000_000);
                assert_eq!(source, TimeSource::Device);
            }
            SyncEvent::Failed(e) => panic!("unexpected failure: {e}"),
        }
    }
}
