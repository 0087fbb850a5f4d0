use std::time::Duration;

/// Terminal failure of a single poll invocation.
///
/// `E` is the error type of the caller's request operation. It is carried
/// through untouched so callers can still inspect what went wrong.
#[derive(Debug, thiserror::Error)]
pub enum PollError<E> {
    /// The request operation failed. Not retried.
    #[error("polling failed: {0}")]
    Operation(#[source] E),
    /// The target kept asking to continue past the configured deadline.
    #[error("polling timed out after {elapsed:?} ({attempts} attempts)")]
    Timeout { elapsed: Duration, attempts: u32 },
    /// The caller cancelled the poll before it reached a terminal state.
    #[error("polling cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
    #[error("invalid poll configuration: {0}")]
    InvalidConfig(String),
}

impl<E> PollError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, PollError::Timeout { .. })
    }

    pub fn is_operation(&self) -> bool {
        matches!(self, PollError::Operation(_))
    }

    /// Short machine-readable tag, used by the CLI error renderer.
    pub fn kind(&self) -> &'static str {
        match self {
            PollError::Operation(_) => "operation",
            PollError::Timeout { .. } => "timeout",
            PollError::Cancelled { .. } => "cancelled",
            PollError::InvalidConfig(_) => "invalid_config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn operation_wraps_source() {
        let err: PollError<Boom> = PollError::Operation(Boom);
        assert_eq!(err.to_string(), "polling failed: boom");
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.is_operation());
        assert_eq!(err.kind(), "operation");
    }

    #[test]
    fn timeout_display() {
        let err: PollError<Boom> = PollError::Timeout { elapsed: Duration::from_secs(3), attempts: 2 };
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "polling timed out after 3s (2 attempts)");
    }
}
