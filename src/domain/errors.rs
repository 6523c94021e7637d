use thiserror::Error;

/// Error taxonomy for the synchronization pipeline.
///
/// `TransientNetwork` only exists inside the client retry loop; once the
/// retry budget is exhausted it escalates to `Remote`. Region jobs absorb
/// every variant into a failed `RegionSyncResult` so nothing propagates
/// across regions.
#[derive(Debug, Error, Clone)]
pub enum SyncError {
    /// Bad input, raised before any network call. Never retried.
    #[error("invalid parameters: {0}")]
    Validation(String),

    /// Bad credentials, or token still rejected after one forced refresh.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Non-success business code from the provider, carries its message.
    #[error("provider error: {0}")]
    Remote(String),

    /// Timeout or connection failure. Retried with backoff by the client.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// Local datastore write failure. Fatal for the current job.
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl SyncError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::TransientNetwork(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_format() {
        let err = SyncError::Validation("date range too wide".to_string());
        assert_eq!(err.to_string(), "invalid parameters: date range too wide");
    }

    #[test]
    fn test_only_network_errors_are_transient() {
        assert!(SyncError::TransientNetwork("timeout".into()).is_transient());
        assert!(!SyncError::Remote("05003".into()).is_transient());
        assert!(!SyncError::Auth("bad credentials".into()).is_transient());
        assert!(!SyncError::Persistence("disk full".into()).is_transient());
    }
}
