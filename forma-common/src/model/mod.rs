// src/model/mod.rs
// Declares the modules within the model directory.

pub mod build_config;
pub mod formula;
pub mod platform;
pub mod receipt;
pub mod verification;

// Re-export
pub use build_config::{BuildConfig, BuildSpec, BuildType, Toggle};
pub use formula::{Formula, HeadSpec, Release, ReleaseVersion, SourceSpec};
pub use platform::{HostPlatform, MacOSVersion, Platform, PlatformBranch, PlatformTable};
pub use receipt::{InstallReceipt, ReceiptSource};
pub use verification::{CliCheck, CliSpec, TestSpec};
