// forma/src/cli.rs
//! Defines the command-line argument structure using clap.
use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand};
use forma_common::error::Result;
use forma_common::{Cache, Config};
use forma_core::{detect_host, Evaluator, NetFetcher, PathLocator, SystemRunner};

pub mod audit;
pub mod fetch;
pub mod info;
pub mod install;
pub mod list;

use crate::cli::audit::Audit;
use crate::cli::fetch::Fetch;
use crate::cli::info::Info;
use crate::cli::install::InstallArgs;
use crate::cli::list::List;
use crate::cli::test::TestArgs;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "forma", bin_name = "forma")]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Additional directory searched for <name>.toml formula files
    #[arg(long = "formula-dir", value_name = "DIR", global = true)]
    pub formula_dir: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch, build, install and verify a formula release
    Install(InstallArgs),
    /// Download and verify a release archive into the cache
    Fetch(Fetch),
    /// Show a formula and its releases
    Info(Info),
    /// Report formula issues without building
    Audit(Audit),
    /// Re-run verification against an installed release
    Test(TestArgs),
    /// List installed releases
    List(List),
}

impl Command {
    pub async fn run(&self, config: &Config, cache: Arc<Cache>) -> Result<()> {
        match self {
            Self::Install(command) => command.run(config, cache).await,
            Self::Fetch(command) => command.run(config, cache).await,
            Self::Info(command) => command.run(config).await,
            Self::Audit(command) => command.run(config).await,
            Self::Test(command) => command.run(config, cache).await,
            Self::List(command) => command.run(config).await,
        }
    }
}

pub type SystemEvaluator<'a> = Evaluator<'a, NetFetcher, SystemRunner, PathLocator>;

/// An evaluator wired to the network, real processes and `PATH`.
pub fn system_evaluator<'a>(config: &'a Config, cache: &'a Cache) -> Result<SystemEvaluator<'a>> {
    Ok(Evaluator::new(
        config,
        cache,
        detect_host()?,
        NetFetcher::new()?,
        SystemRunner,
        PathLocator,
    ))
}
