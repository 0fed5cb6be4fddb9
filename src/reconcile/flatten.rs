use crate::telemetry::to_epoch_millis;
use serde_json::{Map, Value};

/// Presence of any of these marks a node as a terminal record rather than a
/// date bucket.
const TERMINAL_MARKERS: &[&str] = &[
    "unixTimestamp",
    "timestamp",
    "temperature",
    "fireProbability",
    "fireRiskProbability",
];

/// One flattened history record: the entry key (usually a unix-seconds
/// string) plus its raw fields.
#[derive(Clone, Debug, PartialEq)]
pub struct FlatEntry {
    pub key: String,
    pub fields: Map<String, Value>,
}

impl FlatEntry {
    /// Best available timestamp for ordering and charting:
    /// `unixTimestamp`, then `timestamp`, then the entry key itself.
    fn timestamp_candidate(&self) -> Option<Value> {
        self.fields
            .get("unixTimestamp")
            .or_else(|| self.fields.get("timestamp"))
            .cloned()
            .or_else(|| Some(Value::String(self.key.clone())))
    }

    pub fn epoch_millis(&self) -> Option<i64> {
        self.timestamp_candidate()
            .as_ref()
            .and_then(to_epoch_millis)
    }

    fn sort_key(&self) -> f64 {
        self.timestamp_candidate()
            .as_ref()
            .and_then(crate::telemetry::value_as_f64)
            .filter(|n| n.is_finite())
            .unwrap_or(0.0)
    }
}

/// Flattens a bulk history tree into terminal records. Supports both flat
/// maps (`{entryKey: record}`) and date-bucketed maps
/// (`{date: {entryKey: record}}`); the bucket key is discarded, the child
/// key kept.
pub fn flatten(tree: &Value) -> Vec<FlatEntry> {
    let Some(root) = tree.as_object() else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for (key, node) in root {
        let Some(fields) = node.as_object() else {
            continue;
        };
        if TERMINAL_MARKERS.iter().any(|m| fields.contains_key(*m)) {
            out.push(FlatEntry {
                key: key.clone(),
                fields: fields.clone(),
            });
        } else {
            for (child_key, child) in fields {
                if let Some(child_fields) = child.as_object() {
                    out.push(FlatEntry {
                        key: child_key.clone(),
                        fields: child_fields.clone(),
                    });
                }
            }
        }
    }
    out
}

/// Sorts ascending by the numeric timestamp candidate (unparseable sorts as
/// 0) and keeps the most recent `capacity` entries.
pub fn sort_and_trim(mut entries: Vec<FlatEntry>, capacity: usize) -> Vec<FlatEntry> {
    entries.sort_by(|a, b| {
        a.sort_key()
            .partial_cmp(&b.sort_key())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let excess = entries.len().saturating_sub(capacity);
    entries.split_off(excess)
}

#[cfg(test)]
mod tests {
    use super::{flatten, sort_and_trim};
    use serde_json::json;

    #[test]
    fn bucketed_tree_emits_child_records_with_child_keys() {
        let tree = json!({
            "2025-10-14": {
                "1760477413": {"temperature": 21.5, "timestamp": 1760477413}
            }
        });
        let entries = flatten(&tree);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "1760477413");
        assert_eq!(entries[0].fields["temperature"], json!(21.5));
    }

    #[test]
    fn flat_tree_emits_the_same_record() {
        let tree = json!({"1760477413": {"temperature": 21.5}});
        let entries = flatten(&tree);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "1760477413");
        assert_eq!(entries[0].fields["temperature"], json!(21.5));
    }

    #[test]
    fn non_object_nodes_are_skipped() {
        let tree = json!({"a": 1, "b": {"temperature": 2.0}, "c": null});
        let entries = flatten(&tree);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "b");
    }

    #[test]
    fn sort_prefers_unix_timestamp_then_timestamp_then_key() {
        let tree = json!({
            "3": {"temperature": 3.0},
            "9999": {"temperature": 1.0, "unixTimestamp": 1},
            "1": {"temperature": 2.0, "timestamp": 2}
        });
        let sorted = sort_and_trim(flatten(&tree), 60);
        let temps: Vec<f64> = sorted
            .iter()
            .map(|e| e.fields["temperature"].as_f64().unwrap())
            .collect();
        assert_eq!(temps, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn unparseable_timestamps_sort_first_as_zero() {
        let tree = json!({
            "garbage": {"temperature": 1.0},
            "100": {"temperature": 2.0}
        });
        let sorted = sort_and_trim(flatten(&tree), 60);
        assert_eq!(sorted[0].fields["temperature"], json!(1.0));
        assert_eq!(sorted[0].epoch_millis(), None);
    }

    #[test]
    fn trim_keeps_the_most_recent_entries() {
        let mut root = serde_json::Map::new();
        for i in 0..10 {
            root.insert(
                format!("{}", 1_700_000_000 + i),
                json!({"temperature": i as f64}),
            );
        }
        let sorted = sort_and_trim(flatten(&root.into()), 3);
        let temps: Vec<f64> = sorted
            .iter()
            .map(|e| e.fields["temperature"].as_f64().unwrap())
            .collect();
        assert_eq!(temps, vec![7.0, 8.0, 9.0]);
    }

    #[test]
    fn entry_key_resolves_seconds_scale_millis() {
        let tree = json!({"1760477413": {"temperature": 21.5}});
        let entries = flatten(&tree);
        assert_eq!(entries[0].epoch_millis(), Some(1_760_477_413_000));
    }
}
