use std::time::Duration;

use chrono::Utc;
use clap::Args;
use colored::Colorize;
use forma_common::config::Config;
use forma_common::error::Result;
use forma_common::keg::{InstalledKeg, KegRegistry};
use prettytable::{format, Cell, Row, Table};

#[derive(Args, Debug)]
pub struct List {
    /// Only list installs whose verification has not passed
    #[arg(long)]
    pub uncertified: bool,
}

impl List {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let kegs: Vec<InstalledKeg> = KegRegistry::new(config.clone())
            .list_installed_kegs()?
            .into_iter()
            .filter(|k| !self.uncertified || !k.is_certified())
            .collect();
        if kegs.is_empty() {
            println!("{}", "0 formulas installed".yellow());
            return Ok(());
        }

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.add_row(Row::new(vec![
            Cell::new("Name").style_spec("b"),
            Cell::new("Version").style_spec("b"),
            Cell::new("Certified").style_spec("b"),
            Cell::new("Installed").style_spec("b"),
        ]));
        for keg in &kegs {
            let (certified, age) = match &keg.receipt {
                Some(receipt) => {
                    let elapsed = (Utc::now() - receipt.installed_at)
                        .to_std()
                        .unwrap_or(Duration::ZERO);
                    let rounded = Duration::from_secs(elapsed.as_secs());
                    (
                        if receipt.certified {
                            Cell::new("✔").style_spec("Fg")
                        } else {
                            Cell::new("✖").style_spec("Fr")
                        },
                        format!("{} ago", humantime::format_duration(rounded)),
                    )
                }
                None => (Cell::new("?").style_spec("Fy"), "-".to_string()),
            };
            table.add_row(Row::new(vec![
                Cell::new(&keg.name).style_spec("Fb"),
                Cell::new(&keg.version_str),
                certified,
                Cell::new(&age),
            ]));
        }
        table.printstd();
        println!("{} install(s)", kegs.len());
        Ok(())
    }
}
