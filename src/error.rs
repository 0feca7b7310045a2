//! Error types for the PDF writer.
//!
//! Every fallible write step returns [`Result`]. Any error raised while a
//! document is being written is fatal for that write: the partially written
//! output must be discarded by the caller.

/// Result type alias for writer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while creating a PDF file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error reported by the underlying byte sink
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte sink refused an append or flush without an IO error
    #[error("Byte sink failure: {0}")]
    SinkFailure(String),

    /// The running file offset no longer fits the offset type
    #[error("File offset overflow: {offset} + {increment}")]
    OffsetOverflow {
        /// Offset before the failing increment
        offset: u64,
        /// Number of bytes that were about to be added
        increment: u64,
    },

    /// Requested PDF version is outside 1.0 - 1.7
    #[error("Unsupported PDF version: {0} (expected 10..=17)")]
    UnsupportedVersion(u8),

    /// The document has no catalog and no source trailer to take it from
    #[error("Document has no /Root catalog")]
    MissingRoot,

    /// Crypto handler construction or transform failure
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Malformed collaborator data
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// The creator already reached its final stage
    #[error("Write already finished")]
    WriterFinished,

    /// `continue_write` was called before `create`
    #[error("Write has not been started")]
    NotStarted,
}
