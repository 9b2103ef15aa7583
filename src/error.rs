//! Error type shared across the crate.

use thiserror::Error;

/// Failures that abort a run before (or instead of) any stochastic step.
///
/// Walker death is not represented here: it is a routine outcome of the
/// phaseless projection and is absorbed by the ensemble.
#[derive(Debug, Error)]
pub enum AfqmcError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("shape mismatch in {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: String,
        expected: String,
        found: String,
    },

    #[error("{what} is not Hermitian (max deviation {deviation:.3e})")]
    NonHermitian { what: String, deviation: f64 },

    #[error("Cholesky fields are rank deficient: {0}")]
    RankDeficient(String),

    #[error(
        "Cholesky fields reproduce the two-body integrals only to {residual:.3e}, \
         above chol_thresh = {thresh:.3e}"
    )]
    CholeskyInconsistent { residual: f64, thresh: f64 },

    #[error("trial overlap matrix is singular for spin component {0}")]
    SingularTrial(usize),

    #[error("checkpoint hook failed at step {step}: {reason}")]
    Checkpoint { step: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, AfqmcError>;
