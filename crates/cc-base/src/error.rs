use thiserror::Error;

/// Failure of a call into the computation backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The user dismissed the interaction. Never surfaced.
    #[error("cancelled")]
    Cancelled,
    /// Transient filesystem or network failure.
    #[error("I/O error: {0}")]
    Io(String),
    /// The computation itself failed (git exit status, HTTP status, bad payload).
    #[error("{0}")]
    Process(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl BackendError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BackendError::Cancelled)
    }
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        BackendError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        BackendError::Process(format!("malformed data: {}", e))
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_io() {
        let e = BackendError::Io("disk full".into());
        assert_eq!(e.to_string(), "I/O error: disk full");
    }

    #[test]
    fn display_process_is_bare_message() {
        let e = BackendError::Process("git exited with status 128".into());
        assert_eq!(e.to_string(), "git exited with status 128");
    }

    #[test]
    fn io_error_converts() {
        let e: BackendError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(e, BackendError::Io(_)));
        assert!(!e.is_cancelled());
        assert!(BackendError::Cancelled.is_cancelled());
    }
}
