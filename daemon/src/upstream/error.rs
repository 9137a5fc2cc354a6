use thiserror::Error;

/// Title the panel puts on responses for a session it no longer knows.
pub const SESSION_EXPIRED_SIGNATURE: &str = "Unauthorized Access";

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("login rejected: {0}")]
    Auth(String),

    #[error("session no longer exists: {0}")]
    SessionExpired(String),

    #[error("panel returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error(transparent)]
    Network(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid panel url: {0}")]
    Url(#[from] url::ParseError),
}

impl UpstreamError {
    pub fn is_session_expired(&self) -> bool {
        matches!(self, UpstreamError::SessionExpired(_))
    }
}
