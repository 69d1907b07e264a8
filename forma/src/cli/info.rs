use clap::Args;
use colored::Colorize;
use forma_common::config::Config;
use forma_common::error::Result;
use forma_common::formulary::Formulary;
use forma_common::model::{Formula, Release};
use prettytable::{format, Cell, Row, Table};

#[derive(Args, Debug)]
pub struct Info {
    /// Formula name
    pub name: String,

    /// Print the parsed formula as JSON
    #[arg(long)]
    pub json: bool,
}

impl Info {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let formula = Formulary::new(config).load_formula(&self.name)?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&*formula)?);
            return Ok(());
        }
        print_formula(&formula);
        Ok(())
    }
}

fn print_formula(formula: &Formula) {
    println!("{}", formula.name.green().bold());
    if let Some(desc) = &formula.desc {
        println!("{desc}");
    }
    if let Some(homepage) = &formula.homepage {
        println!("{}", homepage.blue());
    }
    println!(
        "License: {}",
        formula.license.as_deref().unwrap_or("unknown")
    );
    if let Some(head) = &formula.head {
        println!("Head: {} ({})", head.url, head.branch);
    }
    println!();

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.add_row(Row::new(vec![
        Cell::new("Version").style_spec("b"),
        Cell::new("Platforms").style_spec("b"),
        Cell::new("Options").style_spec("b"),
        Cell::new("Verification").style_spec("b"),
    ]));
    for release in formula.releases.iter().rev() {
        table.add_row(Row::new(vec![
            Cell::new(&release.version_str()).style_spec("Fb"),
            Cell::new(&platforms_of(release)),
            Cell::new(&options_of(release)),
            Cell::new(&verification_of(release)),
        ]));
    }
    table.printstd();
}

fn platforms_of(release: &Release) -> String {
    let mut parts = Vec::new();
    if let Some(macos) = &release.platforms.macos {
        match &macos.min_version {
            Some(min) => parts.push(format!("macOS >= {min}")),
            None => parts.push("macOS".to_string()),
        }
    }
    if release.platforms.linux.is_some() {
        parts.push("Linux".to_string());
    }
    parts.join(", ")
}

fn options_of(release: &Release) -> String {
    release
        .build
        .options
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn verification_of(release: &Release) -> String {
    match &release.test {
        None => "none".to_string(),
        Some(test) if release.installs_cli() => format!("{} + cli", test.file_name),
        Some(test) => test.file_name.clone(),
    }
}
