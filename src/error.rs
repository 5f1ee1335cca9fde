//! Request-level error taxonomy.
//!
//! Only quota exhaustion, unrecoverable external-service failures and
//! cancellation end a request. Degraded detection, dropped labels and a
//! failed overlay are reported in the result, never raised.

use thiserror::Error;

use crate::pipeline::stage::PipelineStage;

/// Failure reported by an external collaborator (image generator, storage).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExternalError {
    /// The service refused the call because its own quota is exhausted.
    #[error("service quota exceeded")]
    QuotaExceeded,
    /// The call did not finish within its deadline.
    #[error("timed out")]
    Timeout,
    /// Any other failure (network, bad response, invalid image).
    #[error("{0}")]
    Service(String),
}

impl ExternalError {
    /// Timeouts and service errors may succeed on a second attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExternalError::Timeout | ExternalError::Service(_))
    }
}

/// Errors that end a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed request input, for front ends that validate uploads
    /// before building a request.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The daily generation quota is used up.
    #[error("daily quota exceeded ({current_count}/{max_quota})")]
    QuotaExceeded { current_count: u32, max_quota: u32 },

    /// An external service reported its own quota exhaustion.
    #[error("{service} quota exceeded")]
    UpstreamQuotaExceeded { service: String },

    /// An external service failed after exhausting the retry budget.
    #[error("{service} failed after {attempts} attempt(s): {message}")]
    ExternalService {
        service: String,
        attempts: u32,
        message: String,
    },

    /// The caller went away; work stopped before `stage`.
    #[error("cancelled before {stage}")]
    Cancelled { stage: PipelineStage },
}

impl PipelineError {
    /// HTTP status a front end should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::InvalidInput(_) => 400,
            PipelineError::QuotaExceeded { .. } | PipelineError::UpstreamQuotaExceeded { .. } => 429,
            PipelineError::ExternalService { .. } => 500,
            PipelineError::Cancelled { .. } => 499,
        }
    }

    /// Whether the caller may reasonably resubmit the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::ExternalService { .. })
    }
}
