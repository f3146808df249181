use alloy_primitives::B256;

/// Errors raised while decoding blocks, transactions and messages.
///
/// Every variant is final for the bytes that produced it: decoding is pure, so
/// the same input fails the same way on every attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// A fixed-width field needs more bytes than remain
    #[error("truncated input reading {field}: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },
    /// A length or count prefix declares more bytes than remain
    #[error("invalid length for {field}: declared {declared} bytes, {remaining} remaining")]
    InvalidLength {
        field: &'static str,
        declared: u64,
        remaining: usize,
    },
    #[error("unknown merkle tree id {0}")]
    UnknownTreeId(u8),
    #[error("duplicate root for merkle tree id {0}")]
    DuplicateTreeId(u8),
    #[error("missing root for {0}")]
    MissingTreeRoot(&'static str),
    /// The embedded content hash disagrees with the recomputed one
    #[error("{field} checksum mismatch: embedded {embedded}, computed {computed}")]
    ChecksumMismatch {
        field: &'static str,
        embedded: B256,
        computed: B256,
    },
    #[error("unsupported encoding version {0}")]
    UnsupportedVersion(u8),
    #[error("{0} trailing bytes after {1}")]
    TrailingBytes(usize, &'static str),
}
