// src/scanner/error.rs
use thiserror::Error;

/// Everything that can go wrong while building, gluing or loading a scanner.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Product construction grew past the configured bound.
    #[error("{resource} exceeds the limit of {limit}")]
    SizeExceeded { resource: &'static str, limit: usize },

    /// The glued-state index ran out of slots before exploration finished.
    #[error("glued state lookup table is full ({capacity} slots)")]
    LookupTableFull { capacity: usize },

    #[error("bad scanner image: {0}")]
    Format(#[from] FormatError),

    /// Programming error on the caller's side (non-deterministic input,
    /// writing through a mapped scanner, ...).
    #[error("precondition violated: {0}")]
    Precondition(String),

    #[error(transparent)]
    Io(std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("EOF reached while reading {what}")]
    Eof { what: &'static str },
    #[error("bad magic")]
    BadMagic,
    #[error("unsupported format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("scanner kind {found} where {expected} was expected")]
    WrongKind { found: u32, expected: u32 },
    #[error("locals block is {found} bytes (expected {expected})")]
    LocalsSize { found: u32, expected: u32 },
    #[error("buffer is not aligned to {align} bytes")]
    Misaligned { align: usize },
    #[error("inconsistent geometry: {0}")]
    BadGeometry(String),
    #[error("mapping requires a little-endian target")]
    BigEndian,
}

impl From<std::io::Error> for ScanError {
    fn from(e: std::io::Error) -> Self {
        // Short reads are a property of the image, not of the stream.
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ScanError::Format(FormatError::Eof { what: "scanner" })
        } else {
            ScanError::Io(e)
        }
    }
}

pub type Result<T, E = ScanError> = std::result::Result<T, E>;
