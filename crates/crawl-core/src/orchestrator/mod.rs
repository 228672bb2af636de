//! Fan-out/fan-in orchestration.
//!
//! `run_all` launches one concurrent unit per registry target, all sharing a
//! single client handle, and returns only after every unit has finished. The
//! returned `PassReport` carries each unit's outcome; unit failures never
//! become the pass's error.

pub mod pass;
pub mod report;

pub use pass::{run_all, OrchestratorOptions};
pub use report::{PassReport, UnitOutcome, UnitStatus};
