//! Domain models for qagate.
//!
//! Canonical definitions for the core entities:
//! - `ToolDescriptor`: static catalog record for one external tool
//! - `ScopeDef`: named repository partition and its activation predicates
//! - `ExecutionRequest`: immutable description of one run
//! - `ToolResult` / `Finding`: uniform wrapper output
//! - `Report`: aggregated verdicts

pub mod digest;
pub mod dimension;
pub mod error;
pub mod finding;
pub mod invocation;
pub mod report;
pub mod request;
pub mod result;
pub mod scope;
pub mod severity;
pub mod tool;

pub use dimension::Dimension;
pub use error::{QaError, RequestError, Result};
pub use finding::Finding;
pub use invocation::{InvocationState, ToolInvocation};
pub use report::{DimensionVerdict, Report, ReportSummary};
pub use request::{ExecutionRequest, Mode, RequestFields, RunKind, ScopeSelector};
pub use result::{RawOutput, SkipKind, ToolResult, ToolStatus};
pub use scope::{file_extension, ScopeDef};
pub use severity::{Band, SeverityMap};
pub use tool::{ParserKind, ToolDescriptor, FILES_PLACEHOLDER, ROOT_PLACEHOLDER};
