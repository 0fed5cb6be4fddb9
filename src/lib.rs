//! Normalization and reconciliation engine for drifted fire-sensor
//! telemetry.
//!
//! The remote store has shipped at least three incompatible payload
//! generations (field casing, units/keys, flat vs. date-bucketed history,
//! explicit vs. derived alarm flags). This crate reconciles them into one
//! canonical reading with a bounded rolling history, persists that state to
//! local JSON slots, and keeps serving the last known good state when the
//! remote store is slow, absent, or malformed. Presentation layers read
//! [`reconcile::ReconcileEngine::snapshot`] and invoke
//! [`reconcile::ReconcileEngine::toggle_alarm`]; everything else flows in
//! over the MQTT live feed.

pub mod cache;
pub mod config;
pub mod feed;
pub mod reconcile;
pub mod telemetry;
