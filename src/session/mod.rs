//! Server-side session accounting
//!
//! This module turns debounced state reports into billed doomscroll time and
//! tracks whether the upstream detector is still alive.
//!
//! Reports → SessionTracker (lock) → Liveness heartbeat → Accounting → SessionStats

pub mod accounting;
pub mod liveness;
pub mod tracker;

pub use accounting::SessionAccounting;
pub use liveness::LivenessMonitor;
pub use tracker::SessionTracker;
