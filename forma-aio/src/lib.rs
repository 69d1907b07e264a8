// forma-aio/src/lib.rs
//! Asynchronous IO operations for forma (processes, archives, checksums, git)

pub mod checksum;
pub mod extract;
pub mod git;
pub mod process;

pub use checksum::{file_sha256_async, verify_checksum_async};
pub use extract::{extract_archive_async, find_source_root};
pub use git::clone_branch_async;
pub use process::{run_command_async, CommandOutput};
