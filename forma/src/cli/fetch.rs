use std::sync::Arc;

use clap::Args;
use colored::Colorize;
use forma_common::cache::Cache;
use forma_common::config::Config;
use forma_common::error::Result;
use forma_common::formulary::Formulary;

use crate::cli::system_evaluator;

#[derive(Debug, Args)]
pub struct Fetch {
    /// Formula name
    pub name: String,

    /// Release to fetch (defaults to the latest)
    #[arg(long)]
    pub version: Option<String>,
}

impl Fetch {
    pub async fn run(&self, config: &Config, cache: Arc<Cache>) -> Result<()> {
        let formula = Formulary::new(config).load_formula(&self.name)?;
        let evaluator = system_evaluator(config, &cache)?;
        let path = evaluator.fetch(&formula, self.version.as_deref()).await?;
        println!("{} {}", "==>".blue().bold(), path.display());
        Ok(())
    }
}
