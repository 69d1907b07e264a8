// forma-core/src/build/env.rs
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use forma_common::Config;
use tracing::debug;

use super::runner::Invocation;

/// Tool paths and compiler selection for one evaluation, taken from the
/// injected `Config`. Build commands get `CC`/`CXX` explicitly and the
/// verification compile uses `cxx()`.
#[derive(Debug, Clone)]
pub struct BuildEnvironment {
    vars: BTreeMap<String, OsString>,
    cmake: PathBuf,
    cxx: PathBuf,
    jobs: usize,
}

impl BuildEnvironment {
    pub fn new(config: &Config) -> Self {
        let mut vars = BTreeMap::new();
        if let Some(cc) = &config.cc {
            vars.insert("CC".to_string(), cc.clone().into_os_string());
        }
        if let Some(cxx) = &config.cxx {
            vars.insert("CXX".to_string(), cxx.clone().into_os_string());
        }
        debug!(
            "Build environment: cmake={} cxx={} jobs={} vars={:?}",
            config.cmake.display(),
            config.cxx_command().display(),
            config.jobs,
            vars.keys().collect::<Vec<_>>()
        );
        Self {
            vars,
            cmake: config.cmake.clone(),
            cxx: config.cxx_command(),
            jobs: config.jobs.max(1),
        }
    }

    pub fn cmake(&self) -> &Path {
        &self.cmake
    }

    pub fn cxx(&self) -> &Path {
        &self.cxx
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    pub fn apply_to(&self, mut invocation: Invocation) -> Invocation {
        for (key, value) in &self.vars {
            invocation = invocation.env(key.clone(), value);
        }
        invocation
    }
}
