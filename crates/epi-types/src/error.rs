use thiserror::Error;

#[derive(Error, Debug)]
pub enum EpiError {
    #[error("NLP solve failed at step {step}: {message}")]
    SolverFailure { step: usize, message: String },

    #[error("Aggregation input must be 1-D or 2-D, got {ndim}-D")]
    DimensionError { ndim: usize },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Estimator failure: {0}")]
    EstimatorFailure(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl EpiError {
    /// True for the errors that end the control loop early but leave the
    /// recorded history valid.
    pub fn is_solver_failure(&self) -> bool {
        matches!(self, EpiError::SolverFailure { .. })
    }
}

pub type EpiResult<T> = Result<T, EpiError>;
