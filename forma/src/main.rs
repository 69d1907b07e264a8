// forma/src/main.rs
use std::fs;
use std::process;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use forma_common::cache::Cache;
use forma_common::config::Config;
use forma_common::error::{FormaError, Result};
use tracing::level_filters::LevelFilter;
use tracing::{debug, error};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

mod cli;
use cli::CliArgs;

fn init_logging(config: &Config, verbose: u8) {
    let level_filter = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let max_log_level = level_filter.into_level().unwrap_or(tracing::Level::INFO);

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("FORMA_LOG")
        .from_env_lossy();

    let log_dir = config.logs_dir();
    if verbose > 0 {
        if let Err(e) = fs::create_dir_all(&log_dir) {
            eprintln!(
                "{} Failed to create log directory {}: {}",
                "Error:".red().bold(),
                log_dir.display(),
                e
            );
        } else {
            let file_appender = tracing_appender::rolling::daily(&log_dir, "forma.log");
            let (non_blocking_appender, guard) = tracing_appender::non_blocking(file_appender);

            let stderr_writer = std::io::stderr.with_max_level(max_log_level);
            let file_writer = non_blocking_appender.with_max_level(max_log_level);

            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(stderr_writer.and(file_writer))
                .with_ansi(true)
                .without_time()
                .try_init();

            // Keep the appender flushing until exit
            Box::leak(Box::new(guard));

            debug!(
                "Verbose logging enabled. Writing logs to: {}/forma.log",
                log_dir.display()
            );
            return;
        }
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .without_time()
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let mut config = Config::load()
        .map_err(|e| FormaError::Config(format!("Could not load config: {e}")))?;
    config
        .formula_dirs
        .splice(0..0, cli_args.formula_dir.iter().cloned());

    init_logging(&config, cli_args.verbose);

    let cache = Arc::new(Cache::new(&config).map_err(|e| {
        FormaError::Cache(format!(
            "Could not initialize cache at {}: {e}",
            config.cache_dir().display()
        ))
    })?);

    if let Err(e) = cli_args.command.run(&config, cache).await {
        error!("Command failed: {:#}", e);
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        process::exit(1);
    }

    debug!("Command completed successfully.");
    Ok(())
}
