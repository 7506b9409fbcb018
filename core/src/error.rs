use thiserror::Error;

/// A serialized index could not be turned back into an [`InvertedIndex`](crate::InvertedIndex).
///
/// The index is always regenerable from its source documents, so no partial
/// recovery is attempted: any of these aborts the load.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("index data is empty")]
    Empty,
    #[error("unterminated Search.setIndex(...) wrapper")]
    UnterminatedWrapper,
    #[error("malformed index JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed binary index: {0}")]
    Binary(#[from] bincode::Error),
    #[error("{field} has {found} entries, expected {expected}")]
    LengthMismatch { field: &'static str, expected: usize, found: usize },
    #[error("{table} entry {term:?} references document {doc} but the index has {num_docs} documents")]
    DocOutOfRange { table: &'static str, term: String, doc: u32, num_docs: usize },
    #[error("unsupported index version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("failed to encode index: {0}")]
    EncodeBinary(#[source] bincode::Error),
    #[error("failed to encode index: {0}")]
    EncodeJson(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
