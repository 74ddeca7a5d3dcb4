use thiserror::Error;

/// Everything that can go wrong talking to the backend, one variant per
/// failure class. Callers match on variants instead of message strings.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connection refused, DNS failure, timeout — the request never produced
    /// a response.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    #[error("backend returned HTTP {status}")]
    Http { status: u16 },

    /// The response body was not the JSON shape the endpoint documents.
    #[error("malformed response: {0}")]
    Decode(String),

    /// The backend answered 200 but signaled a logical failure in the payload.
    #[error("backend error: {message}")]
    Backend { message: String },
}

impl GatewayError {
    /// Short tag for journals and status lines.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Transport(_) => "transport",
            GatewayError::Http { .. } => "http",
            GatewayError::Decode(_) => "decode",
            GatewayError::Backend { .. } => "backend",
        }
    }
}
