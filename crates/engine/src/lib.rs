//! SheetRun Engine
//!
//! Loads workbooks, validates every row against the action catalog, and runs
//! valid sheets row by row through a [`Driver`], retrying transient failures
//! and writing the outcome back into the sheet.

pub mod actions;
pub mod args;
pub mod bridge;
pub mod catalog;
pub mod container;
pub mod context;
pub mod driver;
pub mod error;
pub mod markup;
pub mod report;
pub mod runner;
pub mod validate;
pub mod workbook;

pub use args::{resolve_arguments, ArgValue, TypedArgs};
pub use bridge::BridgeDriver;
pub use catalog::{
    ActionCatalog, ActionFn, ActionFuture, ActionHandler, ActionProvider, ActionSignature,
    CatalogBuilder, Directive, ParamKind,
};
pub use container::{ExecutionContainer, ResolvedInvocation};
pub use context::ActionContext;
pub use driver::{Driver, DryRunDriver, Target};
pub use error::{ActionError, ActionResult, ArgError, DriverError, IssueKind, ValidationIssue};
pub use markup::Markup;
pub use report::{HistorySink, JsonReport, MemorySink, ReportSink, Reporter, RetryNotice};
pub use runner::{Runner, SheetLifecycle, SheetPhase, ValidationSummary};
pub use validate::{validate_row, validate_sheet, AssetIndex, SheetValidation, ValidationResult};
pub use workbook::{Mark, SheetSelector, Workbook};
