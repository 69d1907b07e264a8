// Shared fixtures for the evaluation tests: a four-release ccap formula whose
// digests are computed from archives generated here, plus fake collaborators.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use flate2::write::GzEncoder;
use flate2::Compression;
use forma_aio::CommandOutput;
use forma_common::error::{ExitStatus, FormaError, Result};
use forma_common::{Config, Formula};

use crate::build::{CommandRunner, Invocation};
use crate::resolve::ArchiveFetcher;

pub const VERSIONS: [&str; 4] = ["1.0.0", "1.0.1", "1.2.0", "1.5.0"];
pub const HEAD_COMMIT: &str = "4f1c2d3e4f5a6b7c8d9e0f1a2b3c4d5e6f7a8b9c";

pub fn archive_url(version: &str) -> String {
    format!("https://github.com/wysaid/CameraCapture/archive/refs/tags/v{version}.tar.gz")
}

/// A GitHub-style source archive. Headers carry no timestamps, so the bytes
/// and therefore the digest are stable across runs.
pub fn archive(version: &str) -> Vec<u8> {
    let root = format!("CameraCapture-{version}");
    let files: [(String, String); 2] = [
        (
            format!("{root}/CMakeLists.txt"),
            format!("project(ccap VERSION {version} LANGUAGES CXX)\n"),
        ),
        (format!("{root}/include/ccap.h"), "#pragma once\n".to_string()),
    ];
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, data) in &files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, data.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

pub fn digest(version: &str) -> String {
    forma_net::sha256_hex(&archive(version))
}

const SOURCE_V1_0: &str = r#"#include <ccap.h>
#include <iostream>

int main() {
    ccap::Provider provider;
    auto devices = provider.findDeviceNames();
    std::cout << "Found " << devices.size() << " camera device(s)" << std::endl;
    return 0;
}
"#;

const SOURCE_V1_2: &str = r#"#include <ccap.h>
#include <iostream>

int main() {
    ccap::setErrorCallback([](ccap::ErrorCode code, std::string_view description) {
        std::cerr << "ccap error " << static_cast<int>(code) << ": " << description << std::endl;
    });
    ccap::Provider provider;
    auto devices = provider.findDeviceNames();
    std::cout << "Found " << devices.size() << " camera device(s)" << std::endl;
    return 0;
}
"#;

fn release_toml(version: &str, body: &str) -> String {
    format!(
        r#"
[[releases]]
version = "v{version}"
url = "{url}"
sha256 = "{digest}"
dependencies = [{{ name = "cmake", tags = "BUILD" }}]
{body}
"#,
        url = archive_url(version),
        digest = digest(version),
    )
}

const MACOS_TABLE: &str = r#"
[releases.platforms.macos]
min_version = "high_sierra"
frameworks = ["Foundation", "AVFoundation", "CoreVideo", "CoreMedia", "Accelerate"]
"#;

const LINUX_TABLE: &str = r#"
[releases.platforms.linux]
link_flags = ["-lpthread"]
note = "V4L2 and pthread ship with the base system"
"#;

pub fn formula_toml() -> String {
    let classic_options = r#"
[releases.build.options]
CCAP_BUILD_EXAMPLES = false
CCAP_BUILD_TESTS = false
CCAP_INSTALL = true
"#;
    let test_v1_0 = format!(
        "[releases.test]\nlibraries = [\"ccap\"]\nsource = '''\n{SOURCE_V1_0}'''\n"
    );
    let test_v1_2 = format!(
        "[releases.test]\nlibraries = [\"ccap\"]\nsource = '''\n{SOURCE_V1_2}'''\n"
    );

    let mut toml = String::from(
        r#"name = "ccap"
desc = "High-performance, lightweight cross-platform C++ camera capture library"
homepage = "https://github.com/wysaid/CameraCapture"
license = "MIT"

[head]
url = "https://github.com/wysaid/CameraCapture.git"
branch = "main"
"#,
    );
    toml.push_str(&release_toml(
        "1.0.0",
        &format!("{MACOS_TABLE}{classic_options}{test_v1_0}"),
    ));
    toml.push_str(&release_toml(
        "1.0.1",
        &format!("{MACOS_TABLE}{classic_options}{test_v1_0}"),
    ));
    toml.push_str(&release_toml(
        "1.2.0",
        &format!("{MACOS_TABLE}{LINUX_TABLE}{classic_options}{test_v1_2}"),
    ));
    toml.push_str(&release_toml(
        "1.5.0",
        &format!(
            r#"{MACOS_TABLE}{LINUX_TABLE}
[releases.build.options]
CCAP_BUILD_EXAMPLES = false
CCAP_BUILD_TESTS = false
CCAP_INSTALL = true
CCAP_BUILD_CLI = true

{test_v1_2}
[releases.test.cli]
binary = "ccap"
checks = [
    {{ args = ["--version"], contains = "1.5.0" }},
    {{ args = ["--help"], contains = "Usage" }},
]
"#
        ),
    ));
    toml
}

pub fn formula() -> Formula {
    Formula::from_toml_str(&formula_toml()).unwrap()
}

pub fn config(root: &Path) -> Config {
    let mut config = Config::with_root(root);
    config.cxx = Some(PathBuf::from("/usr/bin/c++"));
    config.jobs = 4;
    config
}

/// Every tool is "installed" under /usr/bin.
pub fn locate(tool: &str) -> Option<PathBuf> {
    Some(PathBuf::from("/usr/bin").join(tool))
}

/// Serves archives from memory by URL and counts network activity.
pub struct FakeFetcher {
    archives: Mutex<HashMap<String, Vec<u8>>>,
    fetches: AtomicUsize,
    checkouts: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        let archives = VERSIONS
            .iter()
            .map(|v| (archive_url(v), archive(v)))
            .collect();
        Self {
            archives: Mutex::new(archives),
            fetches: AtomicUsize::new(0),
            checkouts: AtomicUsize::new(0),
        }
    }

    /// Replaces the bytes served for `version` with a copy that has one bit
    /// flipped.
    pub fn corrupt(&self, version: &str) {
        let mut archives = self.archives.lock().unwrap();
        let bytes = archives.get_mut(&archive_url(version)).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0x01;
    }

    pub fn remove(&self, version: &str) {
        self.archives.lock().unwrap().remove(&archive_url(version));
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn checkouts(&self) -> usize {
        self.checkouts.load(Ordering::SeqCst)
    }
}

impl ArchiveFetcher for FakeFetcher {
    async fn fetch(&self, name: &str, url: &str, mirrors: &[String]) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let archives = self.archives.lock().unwrap();
        std::iter::once(url)
            .chain(mirrors.iter().map(String::as_str))
            .find_map(|u| archives.get(u).cloned())
            .ok_or_else(|| {
                FormaError::FetchUnavailable(
                    name.to_string(),
                    url.to_string(),
                    "HTTP status 404 Not Found".to_string(),
                )
            })
    }

    async fn checkout(&self, _url: &str, _branch: &str, dest: &Path) -> Result<String> {
        self.checkouts.fetch_add(1, Ordering::SeqCst);
        std::fs::create_dir_all(dest)?;
        std::fs::write(dest.join("CMakeLists.txt"), "project(ccap LANGUAGES CXX)\n")?;
        Ok(HEAD_COMMIT.to_string())
    }
}

type FailWhen = Box<dyn Fn(&Invocation) -> bool + Send + Sync>;

/// Records every invocation and answers like a healthy toolchain: every
/// command succeeds and the installed `ccap` binary prints a version and a
/// usage line on stdout.
pub struct FakeRunner {
    calls: Mutex<Vec<Invocation>>,
    fail_when: Option<FailWhen>,
    cli_version: String,
    cli_on_stderr: bool,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_when: None,
            cli_version: "1.5.0".to_string(),
            cli_on_stderr: false,
        }
    }

    /// Makes every invocation matching `predicate` exit with status 2.
    pub fn failing_when(predicate: impl Fn(&Invocation) -> bool + Send + Sync + 'static) -> Self {
        Self {
            fail_when: Some(Box::new(predicate)),
            ..Self::new()
        }
    }

    pub fn with_cli_version(mut self, version: &str) -> Self {
        self.cli_version = version.to_string();
        self
    }

    pub fn with_cli_on_stderr(mut self) -> Self {
        self.cli_on_stderr = true;
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Invocations of the build tool only.
    pub fn build_calls(&self) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|inv| inv.program.file_name().is_some_and(|n| n == "cmake"))
            .collect()
    }
}

impl CommandRunner for FakeRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(invocation.clone());
        if self.fail_when.as_ref().is_some_and(|f| f(invocation)) {
            return Ok(CommandOutput {
                status: ExitStatus(Some(2)),
                stdout: String::new(),
                stderr: "simulated failure".to_string(),
            });
        }
        let is_cli = invocation.program.ends_with("bin/ccap");
        let first_arg = invocation.args.first().and_then(|a| a.to_str());
        let (stdout, stderr) = match (is_cli, first_arg) {
            (true, Some("--version")) => (format!("ccap version {}\n", self.cli_version), String::new()),
            (true, Some("--help")) => ("Usage: ccap [options]\n".to_string(), String::new()),
            _ => (String::new(), String::new()),
        };
        // a CLI that writes everything to stderr
        let (stdout, stderr) = if is_cli && self.cli_on_stderr {
            (String::new(), format!("{stderr}{stdout}"))
        } else {
            (stdout, stderr)
        };
        Ok(CommandOutput {
            status: ExitStatus(Some(0)),
            stdout,
            stderr,
        })
    }
}

pub fn args_of(invocation: &Invocation) -> Vec<String> {
    invocation
        .args
        .iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect()
}
