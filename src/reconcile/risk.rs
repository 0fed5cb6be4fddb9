/// Probability at or above which a reading counts as a fire risk.
pub const RISK_THRESHOLD: f64 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RiskDecision {
    pub is_risk: bool,
}

/// Sole source of truth for the computed risk signal. An explicit upstream
/// alarm flag, when present, takes precedence over this decision for the
/// `alarmOn` state; the threshold decision always drives `fireRisk`.
pub fn evaluate(probability: f64) -> RiskDecision {
    RiskDecision {
        is_risk: probability >= RISK_THRESHOLD,
    }
}
