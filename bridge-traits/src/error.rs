use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Remote API error: status {status}, {message}")]
    Api { status: u16, message: String },

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether the failure is expected to clear on its own (connectivity,
    /// server-side trouble) and is therefore worth retrying later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(BridgeError::Network("timeout".into()).is_transient());
        assert!(BridgeError::Api {
            status: 503,
            message: "unavailable".into()
        }
        .is_transient());
        assert!(!BridgeError::Api {
            status: 404,
            message: "missing".into()
        }
        .is_transient());
        assert!(!BridgeError::NotFound("book-1".into()).is_transient());
    }
}
