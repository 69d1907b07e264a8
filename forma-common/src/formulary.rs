use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::config::Config;
use super::error::{FormaError, Result};
use super::model::formula::Formula;

/// Loads `<name>.toml` formula files from the configured search path and
/// keeps parsed formulas for the lifetime of the process.
pub struct Formulary {
    search_path: Vec<PathBuf>,
    parsed_cache: Mutex<HashMap<String, Arc<Formula>>>,
}

impl Formulary {
    pub fn new(config: &Config) -> Self {
        Self::with_search_path(config.formula_search_path())
    }

    pub fn with_search_path(search_path: Vec<PathBuf>) -> Self {
        Self {
            search_path,
            parsed_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn load_formula(&self, name: &str) -> Result<Arc<Formula>> {
        if let Some(formula) = self.lock_cache()?.get(name) {
            debug!("Loaded formula '{}' from parsed cache.", name);
            return Ok(Arc::clone(formula));
        }

        let path = self.locate(name)?;
        debug!("Parsing formula '{}' from {}", name, path.display());
        let raw = fs::read_to_string(&path)?;
        let formula = Formula::from_toml_str(&raw).map_err(|e| match e {
            FormaError::Toml(inner) => {
                FormaError::ParseError("formula file", format!("{}: {inner}", path.display()))
            }
            other => other,
        })?;
        if formula.name != name {
            return Err(FormaError::ValidationError(format!(
                "{} declares formula '{}', expected '{}'",
                path.display(),
                formula.name,
                name
            )));
        }
        debug!(
            "Successfully loaded formula '{}' with {} release(s)",
            formula.name,
            formula.releases.len()
        );

        let formula = Arc::new(formula);
        self.lock_cache()?
            .insert(name.to_string(), Arc::clone(&formula));
        Ok(formula)
    }

    /// Names of every formula file on the search path, sorted, first
    /// occurrence wins.
    pub fn available(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for dir in &self.search_path {
            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        if !names.iter().any(|n| n == stem) {
                            names.push(stem.to_string());
                        }
                    }
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn locate(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(FormaError::ValidationError(format!(
                "invalid formula name '{name}'"
            )));
        }
        self.search_path
            .iter()
            .map(|dir| dir.join(format!("{name}.toml")))
            .find(|p| p.is_file())
            .ok_or_else(|| {
                FormaError::NotFound(format!(
                    "formula '{}' not found in {}",
                    name,
                    self.search_path
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }

    fn lock_cache(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Arc<Formula>>>> {
        self.parsed_cache
            .lock()
            .map_err(|_| FormaError::Generic("formula cache lock poisoned".to_string()))
    }
}
