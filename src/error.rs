//! Error types for romkit operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RomkitError {
    #[error("Range out of bounds: offset {offset} + length {length} exceeds size {size}")]
    OutOfRange { offset: u64, length: u64, size: u64 },

    #[error("Attempt to read or write past the end of the stream")]
    EndOfStream,

    #[error("Operation on a disposed {0}")]
    Disposed(&'static str),

    #[error("Invalid node name: {0:?} (must be non-empty and contain no '/')")]
    InvalidName(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    // Fields are named `from`/`to` rather than `source` because thiserror
    // reserves a `source` field for the underlying cause.
    #[error("No converter registered for {from} -> {to}")]
    ConverterNotFound {
        from: &'static str,
        to: &'static str,
    },

    #[error("Ambiguous conversion {from} -> {to}: {count} converters match")]
    AmbiguousConversion {
        from: &'static str,
        to: &'static str,
        count: usize,
    },

    #[error("Supplied converter does not cover {from} -> {to}")]
    NotSupported {
        from: &'static str,
        to: &'static str,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RomkitError>;
