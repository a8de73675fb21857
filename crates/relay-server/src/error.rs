//! Server error types.

use std::io;

/// Errors from endpoint control operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Binding the listening socket failed.
    #[error("failed to bind port {port}: {source}")]
    Bind {
        /// Requested port.
        port: u16,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An endpoint is already registered for this port.
    #[error("endpoint already running on port {0}")]
    AlreadyRunning(u16),

    /// No endpoint is registered for this port.
    #[error("no endpoint running on port {0}")]
    NotRunning(u16),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_display() {
        let err = ServerError::Bind {
            port: 80,
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        let text = err.to_string();
        assert!(text.contains("80"));
        assert!(text.contains("bind"));
    }

    #[test]
    fn already_running_display() {
        let err = ServerError::AlreadyRunning(19765);
        assert_eq!(err.to_string(), "endpoint already running on port 19765");
    }

    #[test]
    fn not_running_display() {
        let err = ServerError::NotRunning(19765);
        assert_eq!(err.to_string(), "no endpoint running on port 19765");
    }
}
