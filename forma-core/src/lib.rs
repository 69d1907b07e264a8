// forma-core/src/lib.rs

// Evaluation stages, leaf to root
pub mod audit;
pub mod build;
pub mod deps;
pub mod evaluate;
pub mod platform;
pub mod resolve;
pub mod verify;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export key types for easier use by the CLI crate
pub use audit::{audit_formula, Finding, FindingKind};
pub use build::{CommandRunner, Invocation, SystemRunner};
pub use deps::{PathLocator, ToolLocator};
pub use evaluate::{EvaluationReport, EvaluationRequest, Evaluator};
pub use platform::detect_host;
pub use resolve::{ArchiveFetcher, NetFetcher, SourceResolver};
pub use verify::VerificationOutcome;
