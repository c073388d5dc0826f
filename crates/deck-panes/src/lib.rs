pub mod controller;
pub mod geometry;
pub mod mux;
pub mod orchestrator;
pub mod remote;
pub mod spec;
pub mod style;
pub mod writer;

#[cfg(test)]
pub(crate) mod fake;

pub use controller::{LayoutController, LayoutDecision, LayoutSnapshot};
pub use mux::{Multiplexer, SplitDirection, SplitRequest, TmuxCli};
pub use orchestrator::{plan_layout, ApplyOutcome, LayoutJob, LayoutPlan, PaneOrchestrator};
pub use spec::{PaneSpec, SpawnConfig, SpecBuilder};
pub use writer::SerialWriter;

/// Content panes beside the dashboard's own pane.
pub const MAX_CONTENT_PANES: usize = 5;
