use thiserror::Error;

/// Failure reported by an upstream HTTP service (AI provider or weather API).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct UpstreamError {
    /// HTTP status returned by the upstream, if a response was received at all.
    pub status: Option<u16>,
    /// Structured error code from the provider body, e.g. `RESOURCE_EXHAUSTED`.
    pub code: Option<String>,
    pub message: String,
}

/// Provider codes that mean "quota or rate limit exceeded".
const RATE_LIMIT_CODES: &[&str] = &["RESOURCE_EXHAUSTED", "rate_limit_exceeded", "insufficient_quota"];

impl UpstreamError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Whether this failure is a quota / rate-limit condition.
    ///
    /// The status and the provider code are checked first. Matching on the
    /// message text is a last resort for clients that only surface a string,
    /// and will misfire on messages that merely mention "429".
    pub fn is_rate_limited(&self) -> bool {
        if self.status == Some(429) {
            return true;
        }

        if let Some(code) = &self.code {
            if RATE_LIMIT_CODES.iter().any(|c| c.eq_ignore_ascii_case(code)) {
                return true;
            }
        }

        self.message.contains("429") || self.message.contains("Too Many Requests")
    }
}

/// Error taxonomy shared by every proxied operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    /// Malformed or missing client input.
    #[error("{0}")]
    Validation(String),

    /// A required credential is not configured.
    #[error("{0}")]
    Configuration(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl ProxyError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProxyError::Upstream(e) if e.is_rate_limited())
    }
}

/// Cut an upstream body down to something fit for a log line or error message.
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
