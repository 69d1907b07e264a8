use std::collections::BTreeMap;
use std::sync::Arc;

use clap::Args;
use colored::Colorize;
use forma_common::cache::Cache;
use forma_common::config::Config;
use forma_common::error::Result;
use forma_common::formulary::Formulary;
use forma_core::{EvaluationReport, EvaluationRequest};
use tracing::debug;

use crate::cli::system_evaluator;

#[derive(Debug, Args)]
pub struct InstallArgs {
    /// Formula name
    pub name: String,

    /// Release to install (defaults to the latest)
    #[arg(long)]
    pub version: Option<String>,

    /// Build from the formula's head branch instead of a pinned archive
    #[arg(long)]
    pub head: bool,

    /// Turn a build option on
    #[arg(long = "with", value_name = "OPTION")]
    pub with: Vec<String>,

    /// Turn a build option off
    #[arg(long = "without", value_name = "OPTION")]
    pub without: Vec<String>,

    /// Print the evaluation report as JSON
    #[arg(long)]
    pub json: bool,
}

impl InstallArgs {
    pub fn request(&self) -> EvaluationRequest {
        let mut overrides = BTreeMap::new();
        for option in &self.with {
            overrides.insert(option.clone(), true);
        }
        // --without wins when both name the same option
        for option in &self.without {
            overrides.insert(option.clone(), false);
        }
        EvaluationRequest {
            version: self.version.clone(),
            head: self.head,
            overrides,
        }
    }

    pub async fn run(&self, config: &Config, cache: Arc<Cache>) -> Result<()> {
        let formulary = Formulary::new(config);
        let formula = formulary.load_formula(&self.name)?;
        let evaluator = system_evaluator(config, &cache)?;
        let request = self.request();
        debug!("Install request: {:?}", request);

        let report = evaluator.evaluate(&formula, &request).await?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }
        Ok(())
    }
}

fn print_report(report: &EvaluationReport) {
    println!(
        "{} {} {} on {}",
        "==>".blue().bold(),
        report.formula.bold(),
        report.version,
        report.host
    );
    if report.from_cache {
        println!("    source: cached archive");
    }
    for command in &report.build_commands {
        println!("    {}", command.dimmed());
    }
    for check in &report.verification.cli_checks {
        println!(
            "    {} `{}` contains '{}'",
            "✔".green(),
            check.command,
            check.contains
        );
    }
    println!(
        "{} Installed and verified at {}",
        "==>".green().bold(),
        report.prefix.display()
    );
}
