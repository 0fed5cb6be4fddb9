use crate::telemetry::value_as_f64;
use serde_json::Value;

/// Accepted source keys per canonical sensor field, first match wins. The
/// remote store has drifted through at least three generations of casing and
/// naming; adding a generation means adding a variant here, not new branches.
const TEMPERATURE_KEYS: &[&str] = &["temperature", "Temperature"];
const HUMIDITY_KEYS: &[&str] = &["humidity", "Humidity"];
const ECO2_KEYS: &[&str] = &["eco2", "eCO2"];
const RAW_H2_KEYS: &[&str] = &["rawH2", "rawh2", "Raw H2", "RawH2"];
const RAW_ETHANOL_KEYS: &[&str] = &["rawEthanol", "rawethanol", "Raw Ethanol", "RawEthanol"];
const PRESSURE_KEYS: &[&str] = &["pressure", "Pressure"];
const PROBABILITY_KEYS: &[&str] = &["fireProbability", "fireRiskProbability"];
const ALARM_KEYS: &[&str] = &["fireAlarm", "alarmOn"];
const TIMESTAMP_KEY: &str = "timestamp";

/// Partial canonical reading produced from one raw snapshot. A field absent
/// from the payload is absent here too; the engine's merge decides what that
/// means, never this stage.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalizedUpdate {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub eco2: Option<f64>,
    pub raw_h2: Option<f64>,
    pub raw_ethanol: Option<f64>,
    pub pressure: Option<f64>,
    pub fire_risk_probability: Option<f64>,
    pub alarm_on: Option<bool>,
    /// Carried through unresolved; the timestamp resolver handles it
    /// downstream with a wall-clock fallback.
    pub timestamp: Option<Value>,
}

impl NormalizedUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Maps an arbitrary raw payload into a partial canonical reading.
///
/// Generation-A trees nest the sensor fields under a `sensors` object with
/// top-level fire flags; the nested object is consulted as a secondary source
/// so all generations flow through the same precedence tables. Values that do
/// not coerce to a finite number are dropped rather than poisoning the rest
/// of the payload.
pub fn normalize(raw: &Value) -> NormalizedUpdate {
    let nested = raw.get("sensors").filter(|v| v.is_object());
    let lookup = |keys: &[&str]| -> Option<Value> {
        for source in [Some(raw), nested].into_iter().flatten() {
            for key in keys {
                if let Some(value) = source.get(*key) {
                    return Some(value.clone());
                }
            }
        }
        None
    };
    let numeric = |keys: &[&str]| -> Option<f64> {
        lookup(keys)
            .as_ref()
            .and_then(value_as_f64)
            .filter(|n| n.is_finite())
    };

    // Alarm flags arrive as bools, numbers, or strings thereof; numeric
    // truthiness accepts them uniformly. An unparseable value under an alarm
    // key still counts as an explicit "off".
    let alarm_on = lookup(ALARM_KEYS)
        .as_ref()
        .map(|v| value_as_f64(v).map(|n| n != 0.0).unwrap_or(false));

    NormalizedUpdate {
        temperature: numeric(TEMPERATURE_KEYS),
        humidity: numeric(HUMIDITY_KEYS),
        eco2: numeric(ECO2_KEYS),
        raw_h2: numeric(RAW_H2_KEYS),
        raw_ethanol: numeric(RAW_ETHANOL_KEYS),
        pressure: numeric(PRESSURE_KEYS),
        fire_risk_probability: numeric(PROBABILITY_KEYS),
        alarm_on,
        timestamp: lookup(&[TIMESTAMP_KEY]),
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize, NormalizedUpdate};
    use serde_json::json;

    #[test]
    fn casing_variants_produce_the_same_canonical_value() {
        let lower = normalize(&json!({"temperature": 21.5, "humidity": 40.0}));
        let upper = normalize(&json!({"Temperature": 21.5, "Humidity": 40.0}));
        assert_eq!(lower.temperature, Some(21.5));
        assert_eq!(lower, upper);
    }

    #[test]
    fn first_matching_variant_wins() {
        let update = normalize(&json!({"rawH2": 13000.0, "Raw H2": 1.0}));
        assert_eq!(update.raw_h2, Some(13000.0));
    }

    #[test]
    fn absent_fields_stay_absent() {
        let update = normalize(&json!({"pressure": 1013.2}));
        assert_eq!(update.pressure, Some(1013.2));
        assert_eq!(update.temperature, None);
        assert_eq!(update.alarm_on, None);
        assert_eq!(update.fire_risk_probability, None);
    }

    #[test]
    fn malformed_values_are_excluded_not_poisonous() {
        let update = normalize(&json!({"temperature": "oops", "humidity": "41.5"}));
        assert_eq!(update.temperature, None);
        assert_eq!(update.humidity, Some(41.5));
    }

    #[test]
    fn alarm_accepts_number_string_and_bool_encodings() {
        assert_eq!(normalize(&json!({"fireAlarm": 1})).alarm_on, Some(true));
        assert_eq!(normalize(&json!({"fireAlarm": "0"})).alarm_on, Some(false));
        assert_eq!(normalize(&json!({"alarmOn": true})).alarm_on, Some(true));
        // Boolean(Number("yes")) is false, not an omission.
        assert_eq!(normalize(&json!({"alarmOn": "yes"})).alarm_on, Some(false));
    }

    #[test]
    fn probability_reads_both_spellings() {
        assert_eq!(
            normalize(&json!({"fireProbability": 0.25})).fire_risk_probability,
            Some(0.25)
        );
        assert_eq!(
            normalize(&json!({"fireRiskProbability": 0.75})).fire_risk_probability,
            Some(0.75)
        );
    }

    #[test]
    fn generation_a_nested_sensors_tree_normalizes() {
        let update = normalize(&json!({
            "sensors": {"Temperature": 19.0, "Pressure": 1001.0},
            "fireRiskProbability": 0.8,
            "alarmOn": 1
        }));
        assert_eq!(update.temperature, Some(19.0));
        assert_eq!(update.pressure, Some(1001.0));
        assert_eq!(update.fire_risk_probability, Some(0.8));
        assert_eq!(update.alarm_on, Some(true));
    }

    #[test]
    fn timestamp_is_carried_through_unresolved() {
        let update = normalize(&json!({"timestamp": "1700000000"}));
        assert_eq!(update.timestamp, Some(json!("1700000000")));
    }

    #[test]
    fn empty_payload_yields_empty_update() {
        assert!(normalize(&json!({})).is_empty());
        assert!(normalize(&json!(null)).is_empty());
        assert_eq!(normalize(&json!({})), NormalizedUpdate::default());
    }
}
