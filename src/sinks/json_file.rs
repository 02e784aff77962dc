use std::path::PathBuf;

use anyhow::Error;
use tracing::{error, info};

use crate::engine::events::{GradingEvent, GradingEventKind};
use crate::engine::sink::ReportSink;
use crate::util::write_json_file;

/// Writes the finished suite report to a JSON file.
///
/// Intermediate events are ignored; the file is written once, when the
/// suite finishes, so it never holds a partial report.
#[derive(Debug)]
pub struct JsonReportSink {
    path: PathBuf,
    error: Option<Error>,
}

impl JsonReportSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            error: None,
        }
    }

    /// The write failure of the last report, if any.
    pub fn take_error(&mut self) -> Option<Error> {
        self.error.take()
    }
}

impl ReportSink for JsonReportSink {
    fn emit(&mut self, event: GradingEvent) {
        let GradingEventKind::SuiteFinished { result } = &event.kind else {
            return;
        };

        match write_json_file(&self.path, result) {
            Ok(()) => info!(path = %self.path.display(), "report written"),
            Err(e) => {
                error!(path = %self.path.display(), error = %format!("{:#}", e), "failed to write report");
                self.error = Some(e);
            }
        }
    }
}
