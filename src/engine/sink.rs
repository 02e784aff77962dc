use crate::engine::events::GradingEvent;

pub trait ReportSink: Send {
    fn emit(&mut self, event: GradingEvent);
}
