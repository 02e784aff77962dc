// src/runner.rs

use crate::capture::{DirectoryCapture, NetworkCapture, NoCapture};
use crate::cli::{parse_settle, Cli, Command};
use crate::config::{ExecutableConfig, GraderFile};
use crate::database::{CommandDatabaseReset, DatabaseSetup};
use crate::engine::{validate_suite, SuiteExecutor, TestCaseExecutor};
use crate::loader::YamlSuiteLoader;
use crate::results::SuiteGradingResult;
use crate::sinks::{CollectingReportSink, JsonReportSink};
use crate::util::resolve_relative;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::Path;
use tracing::info;

const DEFAULT_CONFIG: &str = "grader.yaml";

/// Entry point from `main.rs`.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            suite,
            config,
            client,
            server,
            preset,
            output,
            capture_dir,
            stage_timeout,
            start_timeout,
            settle,
            no_db_reset,
        } => {
            let mut cfg = load_config(config.as_deref())?;

            // CLI overrides
            if let Some(path) = client {
                cfg.client.path = Some(path);
            }
            if let Some(path) = server {
                cfg.server.path = Some(path);
            }
            if let Some(p) = preset {
                cfg.grading.apply_preset(p);
            }
            if let Some(path) = output {
                cfg.output.file = Some(path);
            }
            if let Some(dir) = capture_dir {
                cfg.capture.dir = Some(dir);
            }
            if let Some(secs) = stage_timeout {
                cfg.grading.stage_timeout_seconds = secs;
            }
            if let Some(secs) = start_timeout {
                cfg.grading.process_start_timeout_seconds = secs;
            }
            if let Some(s) = settle {
                cfg.grading.settle.strategy = parse_settle(&s);
            }
            if no_db_reset {
                cfg.database = None;
            }

            let report = grade(cfg, &suite).await?;
            println!("{}", serde_json::to_string(&summary(&report))?);
            Ok(())
        }

        Command::Validate {
            suite,
            config,
            client,
            server,
        } => {
            let mut cfg = load_config(config.as_deref())?;
            if let Some(path) = client {
                cfg.client.path = Some(path);
            }
            if let Some(path) = server {
                cfg.server.path = Some(path);
            }

            let cwd = std::env::current_dir().context("Failed to read current directory")?;
            let result = validate_suite(
                &YamlSuiteLoader,
                &suite,
                &absolute(&cwd, &cfg.client),
                &absolute(&cwd, &cfg.server),
            )?;

            println!("{}", serde_json::to_string(&result)?);

            if !result.is_valid() {
                bail!("Suite validation failed ({} problems)", result.errors.len());
            }
            Ok(())
        }
    }
}

/// `grader.yaml` if given or present, otherwise all defaults.
fn load_config(path: Option<&Path>) -> Result<GraderFile> {
    match path {
        Some(p) => GraderFile::load(p),
        None if Path::new(DEFAULT_CONFIG).is_file() => GraderFile::load(Path::new(DEFAULT_CONFIG)),
        None => Ok(GraderFile::default()),
    }
}

fn absolute(base: &Path, exe: &ExecutableConfig) -> ExecutableConfig {
    ExecutableConfig {
        path: exe.path.as_deref().map(|p| resolve_relative(base, p)),
        working_dir: exe.working_dir.as_deref().map(|p| resolve_relative(base, p)),
        args: exe.args.clone(),
    }
}

/// Wire the collaborators from config and grade one suite.
pub async fn grade(cfg: GraderFile, suite: &Path) -> Result<SuiteGradingResult> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;

    let capture: Box<dyn NetworkCapture> = match &cfg.capture.dir {
        Some(dir) => Box::new(DirectoryCapture::new(resolve_relative(&cwd, dir))),
        None => Box::new(NoCapture),
    };

    let mut executor = TestCaseExecutor::new(cfg.grading.clone(), capture);

    if let Some(db) = &cfg.database {
        executor = executor.with_database(DatabaseSetup {
            reset: Box::new(CommandDatabaseReset::from_config(db)),
            script: resolve_relative(suite, &db.script),
            connection: db.connection.clone(),
        });
    }

    info!(
        suite = %suite.display(),
        client = ?cfg.client.path,
        server = ?cfg.server.path,
        "grading"
    );

    let loader = YamlSuiteLoader::new();
    let mut suite_executor = SuiteExecutor::new(&loader, executor)
        .client(absolute(&cwd, &cfg.client))
        .server(absolute(&cwd, &cfg.server));

    match cfg.output.file {
        Some(path) => {
            let mut sink = JsonReportSink::new(resolve_relative(&cwd, &path));
            let report = suite_executor.run(suite, &mut sink).await?;
            if let Some(e) = sink.take_error() {
                return Err(e);
            }
            Ok(report)
        }
        None => {
            let mut sink = CollectingReportSink::new();
            suite_executor.run(suite, &mut sink).await
        }
    }
}

/// Compact, stable JSON printed to stdout after a run.
fn summary(report: &SuiteGradingResult) -> Value {
    let test_cases: Vec<Value> = report
        .test_case_results
        .iter()
        .map(|tc| {
            serde_json::json!({
                "id": tc.test_case_id,
                "passed": tc.passed,
                "earned": tc.earned_marks,
                "max": tc.max_marks,
                "summary": tc.summary,
            })
        })
        .collect();

    serde_json::json!({
        "run_id": report.run_id,
        "suite": report.suite,
        "earned": report.total_earned_marks,
        "max": report.total_max_marks,
        "percentage": report.percentage,
        "critical_errors": report.critical_errors,
        "test_cases": test_cases,
    })
}
