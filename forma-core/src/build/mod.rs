// forma-core/src/build/mod.rs
// Build orchestration: the environment handed to external tools, the command
// seam, and the configure/compile/install pipeline.

pub mod cmake;
pub mod env;
pub mod runner;

pub use cmake::{plan_build, run_build, BuildPlan};
pub use env::BuildEnvironment;
pub use runner::{CommandRunner, Invocation, SystemRunner};
