/// Typed failures from the Prometheus API.
///
/// Display strings are load bearing: they appear verbatim inside
/// diagnostic texts (`server_error: server error: 500`,
/// `bad_data: bad input data`).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PromError {
    /// Network-level failure, timeout or unreadable response body.
    #[error("{0}")]
    Connection(String),

    /// HTTP 5xx without a usable API error body.
    #[error("server_error: server error: {0}")]
    ServerError(u16),

    /// Prometheus rejected the query (`errorType: bad_data`).
    #[error("bad_data: {0}")]
    BadData(String),

    /// Any other API-level error reported by Prometheus.
    #[error("{kind}: {message}")]
    Api { kind: String, message: String },

    /// The configured server URI has no usable host.
    #[error("no host in URI {0:?}")]
    InvalidUri(String),

    /// The response decoded but did not match the expected schema.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// The surrounding run was cancelled; not a server failure.
    #[error("query cancelled")]
    Cancelled,
}

impl PromError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PromError::Cancelled)
    }

    /// URI misconfiguration is an operator mistake, not a server bug.
    pub fn is_uri_error(&self) -> bool {
        matches!(self, PromError::InvalidUri(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_strings_match_diagnostic_templates() {
        assert_eq!(
            PromError::ServerError(500).to_string(),
            "server_error: server error: 500"
        );
        assert_eq!(
            PromError::BadData("bad input data".to_string()).to_string(),
            "bad_data: bad input data"
        );
        assert_eq!(
            PromError::Api {
                kind: "execution".to_string(),
                message: "query timed out".to_string()
            }
            .to_string(),
            "execution: query timed out"
        );
    }
}
