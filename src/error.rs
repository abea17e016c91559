use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvoGraphError {
    #[error("Structural error: {0}")]
    Structural(String),

    #[error("Verification failed [{rule}]: {reason}")]
    Verification { rule: String, reason: String },

    #[error("Evaluation timed out after {0:.2}s")]
    EvaluationTimeout(f64),

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EvoGraphError>;
