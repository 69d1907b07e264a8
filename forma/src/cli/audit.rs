use clap::Args;
use colored::Colorize;
use forma_common::config::Config;
use forma_common::error::{FormaError, Result};
use forma_common::formulary::Formulary;
use forma_core::audit_formula;

#[derive(Args, Debug)]
pub struct Audit {
    /// Formulas to audit (defaults to every formula on the search path)
    pub names: Vec<String>,

    /// Print findings as JSON
    #[arg(long)]
    pub json: bool,
}

impl Audit {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let formulary = Formulary::new(config);
        let names = if self.names.is_empty() {
            formulary.available()?
        } else {
            self.names.clone()
        };

        let mut total = 0;
        for name in &names {
            let formula = formulary.load_formula(name)?;
            let findings = audit_formula(&formula);
            total += findings.len();
            if self.json {
                println!(
                    "{}",
                    serde_json::json!({ "formula": name, "findings": findings })
                );
                continue;
            }
            if findings.is_empty() {
                println!("{} {}", "✔".green(), name.bold());
                continue;
            }
            println!("{} {}", "✖".red(), name.bold());
            for finding in &findings {
                println!("  * {finding}");
            }
        }

        if total > 0 {
            return Err(FormaError::ValidationError(format!(
                "{total} problem(s) in {} formula(s)",
                names.len()
            )));
        }
        Ok(())
    }
}
