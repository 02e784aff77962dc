use crate::engine::events::{GradingEvent, GradingEventKind};
use crate::engine::sink::ReportSink;
use crate::results::StageResult;

/// An in-memory sink that keeps every grading event of a run.
#[derive(Debug, Default)]
pub struct CollectingReportSink {
    events: Vec<GradingEvent>,
}

impl CollectingReportSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn events(&self) -> &[GradingEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<GradingEvent> {
        self.events
    }

    /// Stage results in the order they completed.
    pub fn stage_results(&self) -> Vec<&StageResult> {
        self.events
            .iter()
            .filter_map(|e| match &e.kind {
                GradingEventKind::StageCompleted { stage, .. } => Some(stage),
                _ => None,
            })
            .collect()
    }

    pub fn critical_errors(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match &e.kind {
                GradingEventKind::CriticalError { message, .. } => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl ReportSink for CollectingReportSink {
    fn emit(&mut self, event: GradingEvent) {
        self.events.push(event);
    }
}
