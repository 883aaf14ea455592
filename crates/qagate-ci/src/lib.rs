//! qagate CI - tool execution for the qagate quality gate
//!
//! Provides the execution side of a run:
//! - Tool wrappers that render command templates, spawn tools and parse output
//! - A bounded-concurrency execution controller with per-tool deadlines
//! - Run-wide cancellation wired to Ctrl-C
//! - The orchestrator that turns a request into a `Report`

pub mod cancel;
pub mod command;
pub mod controller;
pub mod orchestrator;
pub mod parsers;
pub mod runner;
pub mod wrapper;

// Re-export key types
pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use controller::{ControllerOutcome, ExecutionController, Plan};
pub use orchestrator::{Orchestrator, OrchestratorParts, ToolListing};
pub use runner::{run_process, ProcessOutcome, ProcessOutput, ProcessSpec};
pub use wrapper::{
    Availability, CommandWrapper, CommandWrapperFactory, ExecContext, ToolWrapper, WrapperFactory,
};
