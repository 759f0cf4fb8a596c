//! Error types.
//!
//! The library reports a small, typed `CurveError`. The binary wraps
//! everything in `AppError`, which carries the process exit code.

use thiserror::Error;

/// Errors produced by curve evaluation and fitting.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CurveError {
    /// A parameter or observation set that cannot be evaluated or fit.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The optimizer failed to reach a finite, converged solution.
    #[error("fit did not converge: {0}")]
    Convergence(String),
}

impl CurveError {
    pub fn invalid(message: impl Into<String>) -> Self {
        CurveError::InvalidParameter(message.into())
    }

    pub fn convergence(message: impl Into<String>) -> Self {
        CurveError::Convergence(message.into())
    }
}

/// Error surfaced to the command line, with the exit code to use.
///
/// Exit codes:
/// - 2: input/output problems (files, CSV schema, JSON)
/// - 3: invalid parameters or observation data
/// - 4: convergence failure
#[derive(Clone, Error)]
#[error("{message}")]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl From<CurveError> for AppError {
    fn from(err: CurveError) -> Self {
        let code = match err {
            CurveError::InvalidParameter(_) => 3,
            CurveError::Convergence(_) => 4,
        };
        AppError::new(code, err.to_string())
    }
}
