use thiserror::Error;

/// Errors raised by transport pump tasks.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("transport task failed: {0}")]
    Task(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::Task("panicked".to_string());
        assert_eq!(err.to_string(), "transport task failed: panicked");

        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        assert!(TransportError::from(io).to_string().contains("pipe closed"));
    }
}
