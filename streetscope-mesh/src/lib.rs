use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("The payload's magic value does not match the expectation: {magic:#010X}")]
    InvalidMagicValue { magic: u32 },

    #[error("Unsupported mesh payload version {version}")]
    UnsupportedVersion { version: u32 },

    #[error("The payload is violating the expected format, because: {reason}")]
    FormatError { reason: &'static str },

    /// Represents all cases of `std::io::Error`, truncated payloads included.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

pub mod mesh;
