use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SignalError {
    /// True for errors a backoff loop should retry.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, SignalError::RateLimited(_))
    }

    /// Map a non-success HTTP status from an upstream service.
    pub fn from_status(status: u16, context: &str) -> Self {
        match status {
            429 => SignalError::RateLimited(format!("{}: HTTP 429", context)),
            403 => SignalError::Forbidden(context.to_string()),
            404 => SignalError::NotFound(context.to_string()),
            other => SignalError::Api(format!("{}: HTTP {}", context, other)),
        }
    }
}

pub type SignalResult<T> = Result<T, SignalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_classification() {
        assert!(SignalError::RateLimited("429".into()).is_rate_limit());
        assert!(!SignalError::Api("500".into()).is_rate_limit());
        assert!(!SignalError::Database("locked".into()).is_rate_limit());
    }

    #[test]
    fn test_from_status() {
        assert!(SignalError::from_status(429, "apewisdom").is_rate_limit());
        assert_eq!(
            SignalError::from_status(403, "r/private"),
            SignalError::Forbidden("r/private".into())
        );
        assert_eq!(
            SignalError::from_status(502, "yahoo GME"),
            SignalError::Api("yahoo GME: HTTP 502".into())
        );
    }
}
