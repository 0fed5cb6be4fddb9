use serde::{Deserialize, Serialize};

/// The single normalized, merged current-state record exposed to consumers.
/// Serde names match the canonical wire casing so persisted slots stay
/// readable by the other tools that share them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalReading {
    #[serde(rename = "Temperature", default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(rename = "Humidity", default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(rename = "eCO2", default, skip_serializing_if = "Option::is_none")]
    pub eco2: Option<f64>,
    #[serde(rename = "RawH2", default, skip_serializing_if = "Option::is_none")]
    pub raw_h2: Option<f64>,
    #[serde(rename = "RawEthanol", default, skip_serializing_if = "Option::is_none")]
    pub raw_ethanol: Option<f64>,
    #[serde(rename = "Pressure", default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    #[serde(rename = "fireRiskProbability", default)]
    pub fire_risk_probability: f64,
    #[serde(rename = "alarmOn", default)]
    pub alarm_on: bool,
    #[serde(rename = "timestampMs", default)]
    pub timestamp_ms: i64,
}

/// One chart-resolution sample. Immutable once appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    #[serde(rename = "timestampMs")]
    pub timestamp_ms: i64,
    #[serde(rename = "Temperature", default)]
    pub temperature: Option<f64>,
    #[serde(rename = "Humidity", default)]
    pub humidity: Option<f64>,
}

/// Shape of the `firely_state` slot. Rewritten after every successful
/// mutation, read back only at engine construction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(rename = "sensorData", default)]
    pub sensor_data: CanonicalReading,
    #[serde(rename = "fireRisk", default)]
    pub fire_risk: bool,
    #[serde(rename = "fireRiskProbability", default)]
    pub fire_risk_probability: f64,
    #[serde(rename = "alarmOn", default)]
    pub alarm_on: bool,
}

/// Engine lifecycle. `TornDown` is terminal and idempotent; there is no
/// transition back into `Restoring`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnginePhase {
    Uninitialized,
    Restoring,
    Subscribing,
    Live,
    TornDown,
}

/// Read-only view handed to external collaborators (cards, charts, the alarm
/// button). They never mutate engine state through it.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineSnapshot {
    pub reading: CanonicalReading,
    pub fire_risk: bool,
    pub fire_risk_probability: f64,
    pub alarm_on: bool,
    pub history: Vec<HistoryPoint>,
    pub phase: EnginePhase,
}
