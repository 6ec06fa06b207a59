use thiserror::Error;

/// Errors from external worker calls, already classified into retryable vs
/// terminal (SPEC_FULL.md §4.6, §7) the way
/// `other_examples/.../darkscraper` classifies `"dead"` vs `"unreachable"`.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("upstream returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("response body could not be parsed: {0}")]
    MalformedResponse(String),
}

impl ClientError {
    /// Connection-level failures, timeouts, 5xx and unparseable success
    /// bodies are retryable; 4xx is terminal (SPEC_FULL.md §4.6, §7).
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Connection(_) | ClientError::Timeout(_) | ClientError::MalformedResponse(_) => true,
            ClientError::UpstreamStatus { status, .. } => *status >= 500,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout(std::time::Duration::from_secs(0))
        } else if err.is_connect() {
            ClientError::Connection(err.to_string())
        } else if let Some(status) = err.status() {
            ClientError::UpstreamStatus {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            ClientError::Connection(err.to_string())
        }
    }
}
