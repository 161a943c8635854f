use thiserror::Error;

/// Failure kinds a campaign run can surface to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CampaignError {
    #[error("missing API credential: set GOOGLE_API_KEY (or GEMINI_API_KEY)")]
    MissingCredential,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("prompt synthesis failed: {0}")]
    SynthesisFailure(String),
    #[error("image rendering unavailable: {0}")]
    RenderUnavailable(String),
}

impl CampaignError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

/// Transport-level failures from a hosted model backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(String),
    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("output blocked by safety filter: {0}")]
    Filtered(String),
    #[error("upstream returned no usable output")]
    Empty,
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Malformed(e.to_string())
        } else {
            Self::Http(e.to_string())
        }
    }
}
