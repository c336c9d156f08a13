//! Doomscroll Tax - temporal decision engine for doomscrolling detection
//!
//! Turns per-frame posture and phone-proximity signals into a debounced
//! "doomscrolling" state, and bills sustained doomscrolling as a running
//! penalty.
//!
//! ## Modules
//!
//! - **Detector side**: heuristics → hysteresis classifier → state reports
//!   (`heuristics`, `hysteresis`, `detector`, `transport`)
//! - **Server side**: report ingestion → session accounting + liveness →
//!   stats snapshot (`report`, `session`, `server`)

pub mod clock;
pub mod config;
pub mod detector;
pub mod error;
pub mod heuristics;
pub mod hysteresis;
pub mod report;
pub mod server;
pub mod session;
pub mod transport;
pub mod types;

pub use config::Config;
pub use detector::{FrameDecision, FramePipeline};
pub use error::EngineError;
pub use hysteresis::HysteresisClassifier;
pub use session::SessionTracker;
pub use types::{FrameObservation, SessionStats, StateReport};

/// Engine version reported by the CLI and the doctor command
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name used in logs and reports
pub const PRODUCER_NAME: &str = "doomscroll-tax";
