//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config resolved → components built → replay task spawned → listener serves
//!
//! Shutdown (shutdown.rs):
//!     Signal received → coordinator notifies → server drains → replay task aborted
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - The API serves immediately; startup replay runs beside it
//! - Replay is bounded by its probe budget, not by shutdown

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::spawn_startup_replay;
