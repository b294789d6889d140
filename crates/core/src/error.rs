use thiserror::Error;

#[derive(Error, Debug)]
pub enum LrfmpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Invalid input{}: {message}", .line.map(|l| format!(" at line {l}")).unwrap_or_default())]
    InvalidInput { line: Option<u64>, message: String },

    #[error("Column '{column}' has zero variance")]
    DegenerateColumn { column: String },

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl LrfmpError {
    /// Invalid input without a source line (raised past the loader boundary).
    pub fn invalid(message: impl Into<String>) -> Self {
        LrfmpError::InvalidInput {
            line: None,
            message: message.into(),
        }
    }

    /// Invalid input tied to a ledger line.
    pub fn invalid_at(line: u64, message: impl Into<String>) -> Self {
        LrfmpError::InvalidInput {
            line: Some(line),
            message: message.into(),
        }
    }
}
