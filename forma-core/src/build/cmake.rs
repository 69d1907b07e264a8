// forma-core/src/build/cmake.rs
// Configure, compile and install with CMake. Each step is one command; the
// first non-zero exit ends the pipeline.

use std::path::{Path, PathBuf};

use forma_common::error::{BuildStep, FormaError, Result};
use forma_common::model::{BuildConfig, PlatformBranch};
use tracing::{debug, error, info};

use super::env::BuildEnvironment;
use super::runner::{CommandRunner, Invocation};

const STD_CMAKE_ARGS: [&str; 4] = [
    "-DCMAKE_INSTALL_LIBDIR=lib",
    "-DCMAKE_FIND_FRAMEWORK=LAST",
    "-DCMAKE_VERBOSE_MAKEFILE=ON",
    "-Wno-dev",
];

/// The three commands of one build, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub build_dir: PathBuf,
    pub steps: Vec<(BuildStep, Invocation)>,
}

impl BuildPlan {
    pub fn command_lines(&self) -> Vec<String> {
        self.steps.iter().map(|(_, inv)| inv.to_string()).collect()
    }
}

/// Lays out the configure, compile and install commands. Nothing runs here, so
/// the same inputs always produce the same plan.
pub fn plan_build(
    env: &BuildEnvironment,
    source_dir: &Path,
    build_dir: &Path,
    config: &BuildConfig,
    branch: &PlatformBranch,
) -> BuildPlan {
    let configure = Invocation::new(env.cmake())
        .arg("-S")
        .arg(source_dir)
        .arg("-B")
        .arg(build_dir)
        .arg(format!("-DCMAKE_BUILD_TYPE={}", config.build_type.as_str()))
        .arg(format!(
            "-DCMAKE_INSTALL_PREFIX={}",
            config.install_prefix().display()
        ))
        .args(STD_CMAKE_ARGS)
        .args(config.cmake_definitions())
        .args(branch.cmake_args())
        .current_dir(source_dir);

    let compile = Invocation::new(env.cmake())
        .arg("--build")
        .arg(build_dir)
        .arg("--parallel")
        .arg(env.jobs().to_string())
        .current_dir(source_dir);

    let install = Invocation::new(env.cmake())
        .arg("--install")
        .arg(build_dir)
        .current_dir(source_dir);

    let steps = BuildStep::ALL
        .into_iter()
        .zip([configure, compile, install])
        .map(|(step, inv)| (step, env.apply_to(inv)))
        .collect();

    BuildPlan {
        build_dir: build_dir.to_path_buf(),
        steps,
    }
}

/// Runs the plan step by step. Returns the command lines that ran.
pub async fn run_build<R: CommandRunner>(runner: &R, plan: &BuildPlan) -> Result<Vec<String>> {
    let mut issued = Vec::with_capacity(plan.steps.len());
    for (step, invocation) in &plan.steps {
        info!("==> Running {} step", step);
        debug!("{}: {}", step, invocation);
        issued.push(invocation.to_string());

        let output = runner.run(invocation).await?;
        if !output.success() {
            error!("CMake {} failed with {}", step, output.status);
            if !output.stdout.trim().is_empty() {
                error!("CMake {} stdout:\n{}", step, output.stdout.trim());
            }
            if !output.stderr.trim().is_empty() {
                error!("CMake {} stderr:\n{}", step, output.stderr.trim());
            }
            return Err(FormaError::BuildStepFailed {
                step: *step,
                status: output.status,
            });
        }
        debug!("CMake {} completed successfully.", step);
    }
    Ok(issued)
}

#[cfg(test)]
mod tests {
    use forma_common::error::ExitStatus;
    use forma_common::model::Toggle;
    use forma_common::Config;

    use super::*;
    use crate::testutil::{self, args_of, FakeRunner};

    fn linux_branch() -> PlatformBranch {
        PlatformBranch::Linux {
            cmake_args: vec!["-DCCAP_WITH_V4L2=ON".into()],
            link_flags: vec!["-lpthread".into()],
            note: None,
        }
    }

    fn build_config() -> BuildConfig {
        let formula = testutil::formula();
        let release = formula.release(Some("1.0.0")).unwrap();
        BuildConfig::from_spec(
            &release.build,
            formula.option_names(),
            "/r/Cellar/ccap/1.0.0",
        )
    }

    #[test]
    fn configure_follows_the_template() {
        let env = BuildEnvironment::new(&testutil::config(Path::new("/r")));
        let plan = plan_build(
            &env,
            Path::new("/s"),
            Path::new("/s/build"),
            &build_config(),
            &linux_branch(),
        );
        let (step, configure) = &plan.steps[0];
        assert_eq!(*step, BuildStep::Configure);
        assert_eq!(
            args_of(configure),
            [
                "-S",
                "/s",
                "-B",
                "/s/build",
                "-DCMAKE_BUILD_TYPE=Release",
                "-DCMAKE_INSTALL_PREFIX=/r/Cellar/ccap/1.0.0",
                "-DCMAKE_INSTALL_LIBDIR=lib",
                "-DCMAKE_FIND_FRAMEWORK=LAST",
                "-DCMAKE_VERBOSE_MAKEFILE=ON",
                "-Wno-dev",
                // CCAP_BUILD_CLI is unset in 1.0.0 and emits nothing
                "-DCCAP_BUILD_EXAMPLES=OFF",
                "-DCCAP_BUILD_TESTS=OFF",
                "-DCCAP_INSTALL=ON",
                "-DCCAP_WITH_V4L2=ON",
            ]
        );
        assert_eq!(
            configure.envs.get("CXX").map(|v| v.to_string_lossy().into_owned()),
            Some("/usr/bin/c++".to_string())
        );
    }

    #[test]
    fn compile_and_install_target_the_build_dir() {
        let env = BuildEnvironment::new(&testutil::config(Path::new("/r")));
        let plan = plan_build(
            &env,
            Path::new("/s"),
            Path::new("/s/build"),
            &build_config(),
            &linux_branch(),
        );
        assert_eq!(args_of(&plan.steps[1].1), ["--build", "/s/build", "--parallel", "4"]);
        assert_eq!(args_of(&plan.steps[2].1), ["--install", "/s/build"]);
        let steps: Vec<_> = plan.steps.iter().map(|(s, _)| *s).collect();
        assert_eq!(steps, BuildStep::ALL);
    }

    #[test]
    fn plans_are_deterministic() {
        let env = BuildEnvironment::new(&Config::with_root("/r"));
        let mut config = build_config();
        config.options.insert("CCAP_BUILD_CLI".into(), Toggle::On);
        let a = plan_build(&env, Path::new("/s"), Path::new("/b"), &config, &linux_branch());
        let b = plan_build(&env, Path::new("/s"), Path::new("/b"), &config, &linux_branch());
        assert_eq!(a, b);
        assert!(a.command_lines()[0].contains("-DCCAP_BUILD_CLI=ON"));
    }

    #[tokio::test]
    async fn failing_compile_stops_before_install() {
        let env = BuildEnvironment::new(&Config::with_root("/r"));
        let plan = plan_build(
            &env,
            Path::new("/s"),
            Path::new("/b"),
            &build_config(),
            &linux_branch(),
        );
        let runner = FakeRunner::failing_when(|inv| args_of(inv).first().is_some_and(|a| a == "--build"));
        let err = run_build(&runner, &plan).await.unwrap_err();
        match err {
            FormaError::BuildStepFailed { step, status } => {
                assert_eq!(step, BuildStep::Compile);
                assert_eq!(status, ExitStatus(Some(2)));
            }
            other => panic!("expected BuildStepFailed, got {other:?}"),
        }
        assert_eq!(runner.calls().len(), 2);
    }

    #[test]
    fn failure_message_names_step_and_status() {
        let err = FormaError::BuildStepFailed {
            step: BuildStep::Install,
            status: ExitStatus(Some(1)),
        };
        assert_eq!(err.to_string(), "Build step 'install' failed with exit status 1");
    }

    #[tokio::test]
    async fn successful_build_reports_every_command() {
        let env = BuildEnvironment::new(&Config::with_root("/r"));
        let plan = plan_build(
            &env,
            Path::new("/s"),
            Path::new("/b"),
            &build_config(),
            &linux_branch(),
        );
        let runner = FakeRunner::new();
        let issued = run_build(&runner, &plan).await.unwrap();
        assert_eq!(issued, plan.command_lines());
        assert_eq!(runner.build_calls().len(), 3);
    }
}
