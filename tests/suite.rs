#![cfg(unix)]

mod common;

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use common::{fast_config, script, sh};
use suitegrader::capture::NoCapture;
use suitegrader::engine::events::GradingEventKind;
use suitegrader::engine::{SuiteExecutor, TestCaseExecutor};
use suitegrader::loader::{SuiteSource, YamlSuiteLoader};
use suitegrader::model::{TestCase, TestCaseConfig, TestCaseEntry, TestStage, TestSuite};
use suitegrader::sinks::CollectingReportSink;

/// Three test cases: one fine, one that does not parse, one without a folder.
struct FlakySource {
    root: PathBuf,
}

impl SuiteSource for FlakySource {
    fn load_suite(&self, path: &Path) -> Result<TestSuite> {
        Ok(TestSuite {
            name: "flaky".into(),
            path: path.to_path_buf(),
            test_cases: vec![
                TestCaseEntry { id: "TC01".into(), marks: 2.0 },
                TestCaseEntry { id: "TC02".into(), marks: 3.0 },
                TestCaseEntry { id: "TC03".into(), marks: 5.0 },
            ],
        })
    }

    fn parse_test_case(&self, folder: &Path, entry: &TestCaseEntry) -> Result<TestCase> {
        if entry.id == "TC02" {
            bail!("stage 2 has no action column");
        }

        Ok(TestCase {
            id: entry.id.clone(),
            path: folder.to_path_buf(),
            marks: entry.marks,
            config: TestCaseConfig::default(),
            stages: vec![TestStage {
                stage_number: 1,
                ..TestStage::default()
            }],
        })
    }
}

#[tokio::test]
async fn broken_test_cases_do_not_stop_the_suite() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("TC01")).unwrap();
    std::fs::create_dir(dir.path().join("TC02")).unwrap();

    let source = FlakySource {
        root: dir.path().to_path_buf(),
    };
    let executor = TestCaseExecutor::new(fast_config(), Box::new(NoCapture));
    let mut suite = SuiteExecutor::new(&source, executor);
    let mut sink = CollectingReportSink::new();

    let report = suite.run(&source.root, &mut sink).await.unwrap();

    assert_eq!(report.test_case_results.len(), 3);
    assert_eq!(report.total_max_marks, 10.0);
    assert_eq!(report.total_earned_marks, 2.0);
    assert_eq!(report.percentage, 20.0);
    assert!(report.run_id.starts_with("grade_"));

    assert_eq!(report.critical_errors.len(), 2);
    assert!(report.critical_errors[0].contains("stage 2 has no action column"));
    assert!(report.critical_errors[1].starts_with("Test case folder not found"));

    let tc02 = &report.test_case_results[1];
    assert_eq!(tc02.earned_marks, 0.0);
    assert_eq!(tc02.max_marks, 3.0);
    assert!(!tc02.passed);

    assert_eq!(sink.critical_errors().len(), 2);
    assert!(matches!(
        sink.events().first().map(|e| &e.kind),
        Some(GradingEventKind::SuiteStarted { test_cases: 3, .. })
    ));
    assert!(matches!(
        sink.events().last().map(|e| &e.kind),
        Some(GradingEventKind::SuiteFinished { .. })
    ));
}

#[tokio::test]
async fn unloadable_suite_fails_the_run() {
    let executor = TestCaseExecutor::new(fast_config(), Box::new(NoCapture));
    let mut suite = SuiteExecutor::new(&YamlSuiteLoader, executor);

    let err = suite
        .run(Path::new("/no/such/suite"), &mut CollectingReportSink::new())
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("Suite folder not found"));
}

#[tokio::test]
async fn yaml_suite_grades_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let suite_dir = dir.path().join("library");
    let tc_dir = suite_dir.join("TC01");
    std::fs::create_dir_all(&tc_dir).unwrap();

    let client = script(
        dir.path(),
        "client.sh",
        "echo '1. List books'\nread choice\necho '{\"count\": 2, \"books\": [\"Dune\", \"Emma\"]}'\nsleep 30\n",
    );

    std::fs::write(
        suite_dir.join("suite.yaml"),
        "name: Library\ntest_cases:\n  - id: TC01\n    marks: 4\n",
    )
    .unwrap();
    std::fs::write(
        tc_dir.join("testcase.yaml"),
        r#"
grade_content: client
stages:
  - stage: 1
    action: StartClient
    client_console: "1. List books"
  - stage: 2
    action: Input
    input: "1"
    client_console: |
      {
        "books": ["Dune", "Emma"],
        "count": 2
      }
  - stage: 3
    action: CloseClient
"#,
    )
    .unwrap();

    let executor = TestCaseExecutor::new(fast_config(), Box::new(NoCapture));
    let mut suite = SuiteExecutor::new(&YamlSuiteLoader, executor).client(sh(&client));
    let report = suite
        .run(&suite_dir, &mut CollectingReportSink::new())
        .await
        .unwrap();

    let tc = &report.test_case_results[0];
    assert!(tc.passed, "{:#?}", tc.stage_results);
    assert_eq!(tc.earned_marks, 4.0);
    assert_eq!(report.suite, "Library");
    assert_eq!(report.percentage, 100.0);
    assert!(suite.executor().active_processes().is_empty());
}

#[tokio::test]
async fn malformed_discovered_test_case_becomes_a_critical_error() {
    let dir = tempfile::tempdir().unwrap();
    for (id, body) in [
        ("TC01", "marks: 2\nstages:\n  - stage: 1\n"),
        ("TC02", "marks: 3\nstages: [not, a, stage\n"),
        ("TC03", "marks: 5\nstages:\n  - stage: 1\n"),
    ] {
        let folder = dir.path().join(id);
        std::fs::create_dir(&folder).unwrap();
        std::fs::write(folder.join("testcase.yaml"), body).unwrap();
    }

    let executor = TestCaseExecutor::new(fast_config(), Box::new(NoCapture));
    let mut suite = SuiteExecutor::new(&YamlSuiteLoader, executor);
    let report = suite
        .run(dir.path(), &mut CollectingReportSink::new())
        .await
        .unwrap();

    let ids: Vec<_> = report.test_case_results.iter().map(|r| r.test_case_id.as_str()).collect();
    assert_eq!(ids, vec!["TC01", "TC02", "TC03"]);

    assert_eq!(report.critical_errors.len(), 1);
    assert!(report.critical_errors[0].contains("TC02"), "{:?}", report.critical_errors);

    assert_eq!(report.total_max_marks, 8.0);
    assert_eq!(report.total_earned_marks, 7.0);
    assert!(!report.test_case_results[1].passed);
}
