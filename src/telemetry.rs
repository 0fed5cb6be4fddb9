use anyhow::Result;
use serde_json::Value;

/// Threshold below which a numeric timestamp is read as seconds rather than
/// milliseconds. Seconds-scale stamps from the drifted feeds are 10 digits;
/// millisecond stamps are 13.
const MILLIS_CUTOFF: f64 = 1e12;

/// Normalizes heterogeneous timestamp representations to epoch milliseconds.
///
/// Accepts numbers, numeric strings, and booleans. Returns `None` for anything
/// that does not coerce to a finite number; callers fall back to the local
/// receive time instead of failing the event.
pub fn to_epoch_millis(value: &Value) -> Option<i64> {
    let n = value_as_f64(value)?;
    if !n.is_finite() {
        return None;
    }
    let ms = if n < MILLIS_CUTOFF { n * 1000.0 } else { n };
    Some(ms as i64)
}

/// Loose numeric coercion shared by the normalizer: numbers pass through,
/// strings are parsed after trimming, booleans map to 1/0. Anything else is
/// not a number.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Decodes an inbound MQTT payload into a dynamic JSON value. The feeds carry
/// whichever schema generation the deployment happens to run, so shape
/// validation happens downstream in the normalizer, not here.
pub fn decode_payload(payload: &mut [u8]) -> Result<Value> {
    let value: Value = simd_json::serde::from_slice(payload)?;
    Ok(value)
}
