use serde::Serialize;

pub mod dispatch;
pub mod events;
pub mod executor;
pub mod sink;
pub mod suite;
pub mod validate;

pub use dispatch::{StageDispatcher, Targets};
pub use executor::TestCaseExecutor;
pub use suite::SuiteExecutor;
pub use validate::validate_suite;

/* ---------------- validation ---------------- */

#[derive(Debug, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

#[derive(Debug, Serialize)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn push_error(&mut self, code: &'static str, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(ValidationError {
            code,
            message: message.into(),
        });
    }

    pub fn is_valid(&self) -> bool {
        self.valid && self.errors.is_empty()
    }
}
