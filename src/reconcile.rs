mod engine;
pub mod flatten;
pub mod history;
pub mod normalize;
pub mod risk;
pub mod types;


pub use engine::ReconcileEngine;

/// Rolling history capacity shared by live appends and bulk-history trims.
pub const HISTORY_CAPACITY: usize = 60;
