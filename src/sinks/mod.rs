pub mod collecting;
pub mod json_file;

pub use collecting::CollectingReportSink;
pub use json_file::JsonReportSink;
