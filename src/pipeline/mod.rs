//! Pipeline entry points for monitoring operations.
//!
//! - `diff`: pure snapshot diffing and change classification
//! - `dispatch`: notification planning and per-recipient delivery
//! - `monitor`: the scrape → diff → notify → persist cycle

pub mod diff;
pub mod dispatch;
pub mod monitor;

pub use diff::{ProgramDiff, diff_program, film_changed};
pub use dispatch::{DispatchStats, NotificationDispatcher, build_plan};
pub use monitor::{MonitorReport, SourceOutcome, run_monitor, run_source_cycle};
