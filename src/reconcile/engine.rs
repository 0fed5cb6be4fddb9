use super::flatten::{flatten, sort_and_trim};
use super::history::BoundedHistoryStore;
use super::normalize::normalize;
use super::risk;
use super::types::{
    CanonicalReading, EnginePhase, EngineSnapshot, HistoryPoint, PersistedState,
};
use crate::cache::{LocalCache, HISTORY_SLOT, STATE_SLOT};
use crate::telemetry::{to_epoch_millis, value_as_f64};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

#[derive(Debug)]
struct EngineState {
    phase: EnginePhase,
    reading: CanonicalReading,
    fire_risk: bool,
    history: BoundedHistoryStore,
}

/// Single-session reconciliation engine. Handlers take the state lock for
/// their full duration, so each inbound event runs to completion (normalize,
/// evaluate, append/replace, persist) before the next is handled.
#[derive(Clone)]
pub struct ReconcileEngine {
    inner: Arc<Mutex<EngineState>>,
    cache: LocalCache,
    alarm_tx: Option<mpsc::UnboundedSender<bool>>,
}

impl ReconcileEngine {
    pub fn new(
        cache: LocalCache,
        history_capacity: usize,
        alarm_tx: Option<mpsc::UnboundedSender<bool>>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(EngineState {
                phase: EnginePhase::Uninitialized,
                reading: CanonicalReading::default(),
                fire_risk: false,
                history: BoundedHistoryStore::new(history_capacity),
            })),
            cache,
            alarm_tx,
        }
    }

    /// Seeds in-memory state from the local cache so consumers keep the last
    /// known readings when the remote store is slow or absent. Runs once,
    /// before any live event.
    pub async fn restore(&self) {
        let mut state = self.inner.lock().await;
        if state.phase != EnginePhase::Uninitialized {
            return;
        }
        state.phase = EnginePhase::Restoring;

        if let Some(persisted) = self.cache.load::<PersistedState>(STATE_SLOT) {
            state.reading = persisted.sensor_data;
            state.fire_risk = persisted.fire_risk;
            state.reading.fire_risk_probability = persisted.fire_risk_probability;
            state.reading.alarm_on = persisted.alarm_on;
            tracing::info!("restored last known state from cache");
        }
        if let Some(points) = self.cache.load::<Vec<HistoryPoint>>(HISTORY_SLOT) {
            let restored = points.len();
            state.history.replace(points);
            tracing::info!(points = restored, "restored history buffer from cache");
        }
    }

    pub async fn mark_subscribing(&self) {
        let mut state = self.inner.lock().await;
        if state.phase == EnginePhase::Restoring || state.phase == EnginePhase::Uninitialized {
            state.phase = EnginePhase::Subscribing;
        }
    }

    pub async fn mark_live(&self) {
        let mut state = self.inner.lock().await;
        if state.phase == EnginePhase::Subscribing {
            state.phase = EnginePhase::Live;
        }
    }

    /// Terminal and idempotent; events arriving afterwards are dropped, not
    /// queued.
    pub async fn teardown(&self) {
        let mut state = self.inner.lock().await;
        state.phase = EnginePhase::TornDown;
    }

    pub async fn phase(&self) -> EnginePhase {
        self.inner.lock().await.phase
    }

    pub async fn snapshot(&self) -> EngineSnapshot {
        let state = self.inner.lock().await;
        EngineSnapshot {
            reading: state.reading.clone(),
            fire_risk: state.fire_risk,
            fire_risk_probability: state.reading.fire_risk_probability,
            alarm_on: state.reading.alarm_on,
            history: state.history.to_vec(),
            phase: state.phase,
        }
    }

    /// One current-reading event: normalize, merge field-wise, derive risk,
    /// append a history point, persist. Fields absent from the payload never
    /// clobber previously held values.
    pub async fn handle_current_reading(&self, raw: &Value, received_at: DateTime<Utc>) {
        if raw.is_null() {
            return;
        }
        let mut state = self.inner.lock().await;
        if state.phase == EnginePhase::TornDown {
            tracing::debug!("dropping current-reading event after teardown");
            return;
        }

        let update = normalize(raw);

        if let Some(v) = update.temperature {
            state.reading.temperature = Some(v);
        }
        if let Some(v) = update.humidity {
            state.reading.humidity = Some(v);
        }
        if let Some(v) = update.eco2 {
            state.reading.eco2 = Some(v);
        }
        if let Some(v) = update.raw_h2 {
            state.reading.raw_h2 = Some(v);
        }
        if let Some(v) = update.raw_ethanol {
            state.reading.raw_ethanol = Some(v);
        }
        if let Some(v) = update.pressure {
            state.reading.pressure = Some(v);
        }

        // Alarm policy: the explicit upstream flag wins when present; the
        // computed threshold decision fills in otherwise and always drives
        // the fire-risk signal.
        let mut alarm_write = None;
        if let Some(prob) = update.fire_risk_probability {
            let prob = prob.clamp(0.0, 1.0);
            state.reading.fire_risk_probability = prob;
            let decision = risk::evaluate(prob);
            state.fire_risk = decision.is_risk;
            let next_alarm = update.alarm_on.unwrap_or(decision.is_risk);
            if next_alarm != state.reading.alarm_on {
                state.reading.alarm_on = next_alarm;
                alarm_write = Some(next_alarm);
            }
        } else if let Some(explicit) = update.alarm_on {
            if explicit != state.reading.alarm_on {
                state.reading.alarm_on = explicit;
                alarm_write = Some(explicit);
            }
        }

        let timestamp_ms = update
            .timestamp
            .as_ref()
            .and_then(to_epoch_millis)
            .unwrap_or_else(|| received_at.timestamp_millis())
            .max(0);
        state.reading.timestamp_ms = timestamp_ms;

        // The chart point reflects this event, not the merged state: a
        // payload without temperature charts a gap, not a stale value.
        state.history.append(HistoryPoint {
            timestamp_ms,
            temperature: update.temperature,
            humidity: update.humidity,
        });

        self.persist_state(&state);
        self.persist_history(&state);
        drop(state);

        if let Some(on) = alarm_write {
            self.send_alarm(on);
        }
    }

    /// One bulk-history event: flatten, order, trim, replace the buffer
    /// wholesale. May discard a live append that raced ahead of it; the bulk
    /// feed is the source of truth for retrospective state.
    pub async fn handle_history_tree(&self, raw: &Value) {
        if raw.is_null() {
            return;
        }
        let mut state = self.inner.lock().await;
        if state.phase == EnginePhase::TornDown {
            tracing::debug!("dropping bulk-history event after teardown");
            return;
        }

        let capacity = state.history.capacity();
        let entries = sort_and_trim(flatten(raw), capacity);
        if entries.is_empty() {
            return;
        }
        let points = entries
            .iter()
            .map(|entry| HistoryPoint {
                timestamp_ms: entry.epoch_millis().unwrap_or(0).max(0),
                temperature: field_number(entry.fields.get("temperature"))
                    .or_else(|| field_number(entry.fields.get("Temperature"))),
                humidity: field_number(entry.fields.get("humidity"))
                    .or_else(|| field_number(entry.fields.get("Humidity"))),
            })
            .collect::<Vec<_>>();
        let replaced = points.len();
        state.history.replace(points);
        tracing::debug!(points = replaced, "replaced history buffer from bulk feed");

        self.persist_history(&state);
    }

    /// Operator override. Optimistic: the local flip and persist happen
    /// regardless of whether the remote write-back later succeeds.
    pub async fn toggle_alarm(&self) -> bool {
        let mut state = self.inner.lock().await;
        if state.phase == EnginePhase::TornDown {
            return state.reading.alarm_on;
        }
        state.reading.alarm_on = !state.reading.alarm_on;
        let next = state.reading.alarm_on;
        self.persist_state(&state);
        drop(state);

        self.send_alarm(next);
        next
    }

    fn persist_state(&self, state: &EngineState) {
        self.cache.save(
            STATE_SLOT,
            &PersistedState {
                sensor_data: state.reading.clone(),
                fire_risk: state.fire_risk,
                fire_risk_probability: state.reading.fire_risk_probability,
                alarm_on: state.reading.alarm_on,
            },
        );
    }

    fn persist_history(&self, state: &EngineState) {
        self.cache.save(HISTORY_SLOT, &state.history.to_vec());
    }

    fn send_alarm(&self, on: bool) {
        if let Some(tx) = &self.alarm_tx {
            if tx.send(on).is_err() {
                tracing::debug!(alarm = on, "alarm writer gone; keeping local state");
            }
        }
    }
}

fn field_number(value: Option<&Value>) -> Option<f64> {
    value.and_then(value_as_f64).filter(|n| n.is_finite())
}
