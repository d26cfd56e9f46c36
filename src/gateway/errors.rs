use thiserror::Error;

/// Transport-level failures. These are caught at the call site, logged,
/// and treated as non-fatal; workflow state may already be ahead of what
/// was communicated when one of these surfaces.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("chat token not found: {0}")]
    TokenNotFound(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status} for {operation}: {message}")]
    Api {
        operation: String,
        status: u16,
        message: String,
    },

    #[error("malformed API response for {operation}: {detail}")]
    MalformedResponse { operation: String, detail: String },
}

impl GatewayError {
    /// Not-found failures are expected during cleanup races (a proof
    /// message pruned by a moderator, a room already deleted) and are
    /// logged at a lower level than genuine transport trouble.
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::Api { status: 404, .. })
    }
}
