use std::io;
use thiserror::Error;

/// Failure taxonomy shared by the wire codecs and the data converter.
///
/// Protocol errors and contract violations always fail the current
/// operation. I/O errors propagate verbatim from the underlying stream.
/// Soft degradations (e.g. stringifying a value the target format cannot
/// carry) are not errors; they warn through the `log` facade instead.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("not a valid extension number: 0x{tag:02x}")]
    InvalidExtension { tag: u8 },

    #[error("no implementation mapping found for '{name}'")]
    NoImplementationMapping { name: String },

    #[error("no derivable type for {kind} value")]
    NoDerivableType { kind: &'static str },

    #[error("value for argument {index} of {type_name} does not match parameter '{param}'")]
    TypeAssertion {
        type_name: String,
        index: usize,
        param: String,
    },

    #[error("endless recursion detected at {path}")]
    EndlessRecursion { path: String },

    #[error("recursion limit {limit} exceeded")]
    RecursionLimit { limit: usize },

    #[error("malformed input: {reason}")]
    Malformed { reason: String },

    #[error("contract violation: {0}")]
    Contract(&'static str),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl CodecError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
