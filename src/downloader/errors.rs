use std::fmt;

use crate::{backend::StoreError, codec::DecodeError, source::SourceError};

/// Fatal downloader errors. The consumer stream yields at most one of these,
/// as its last item.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A source call kept failing after every retry
    #[error("{source} (gave up after {attempts} attempts)")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: SourceError,
    },
    /// The source failed in a way retrying cannot fix
    #[error("block source failed: {0}")]
    Source(#[source] SourceError),
    /// The source served bytes that are not a valid block
    #[error("failed to decode block {height}: {source}")]
    Decode {
        height: u64,
        #[source]
        source: DecodeError,
    },
    /// The source served a valid block at the wrong position
    #[error("expected block {expected}, source returned block {actual}")]
    UnexpectedHeight { expected: u64, actual: u64 },
    /// No common ancestor within the configured depth
    #[error("reorg deeper than {max} blocks (rollback depth {depth})")]
    ReorgDepthExceeded { depth: u64, max: u64 },
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The consumer went away
    #[error("block stream closed")]
    Cancelled,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::RetriesExhausted { source, .. } | SyncError::Source(source) => {
                ErrorKind::from(source)
            }
            SyncError::Decode {
                source: DecodeError::UnknownTreeId(_),
                ..
            } => ErrorKind::UnknownTreeId,
            SyncError::Decode { .. } | SyncError::UnexpectedHeight { .. } => {
                ErrorKind::DecodeError
            }
            SyncError::ReorgDepthExceeded { .. } => ErrorKind::ReorgDepthExceeded,
            SyncError::Store(_) => ErrorKind::Store,
            SyncError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Error labels used in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SourceUnavailable,
    Timeout,
    PartialRange,
    DecodeError,
    UnknownTreeId,
    ReorgDepthExceeded,
    Store,
    Cancelled,
}

impl From<&SourceError> for ErrorKind {
    fn from(err: &SourceError) -> Self {
        match err {
            SourceError::Unavailable(_) => ErrorKind::SourceUnavailable,
            SourceError::Timeout(_) => ErrorKind::Timeout,
            SourceError::PartialRange { .. } => ErrorKind::PartialRange,
            SourceError::Malformed(_) => ErrorKind::DecodeError,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{ErrorKind, SyncError};
    use crate::{codec::DecodeError, source::SourceError};

    #[test]
    fn test_error_kinds() {
        let exhausted = SyncError::RetriesExhausted {
            attempts: 6,
            source: SourceError::Timeout(Duration::from_secs(10)),
        };
        assert_eq!(exhausted.kind(), ErrorKind::Timeout);

        let unknown = SyncError::Decode {
            height: 3,
            source: DecodeError::UnknownTreeId(9),
        };
        assert_eq!(unknown.kind(), ErrorKind::UnknownTreeId);
        assert_eq!(unknown.kind().to_string(), "UnknownTreeId");

        let malformed = SyncError::Source(SourceError::Malformed("odd hex".into()));
        assert_eq!(malformed.kind(), ErrorKind::DecodeError);

        let depth = SyncError::ReorgDepthExceeded { depth: 65, max: 64 };
        assert_eq!(depth.kind(), ErrorKind::ReorgDepthExceeded);
    }
}
