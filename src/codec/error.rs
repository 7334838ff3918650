use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned when unpacking vector blobs.
pub enum CodecError {
    /// Blob length is not a whole number of `f32` components.
    #[error("vector blob length {len} is not a multiple of 4")]
    MisalignedLength {
        /// Blob length in bytes.
        len: usize,
    },

    /// Blob is shorter than the requested dimension.
    #[error("vector blob too short: need {expected} bytes for dim {dim}, got {actual}")]
    TooShort {
        /// Requested dimension.
        dim: usize,
        /// Bytes required.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// Requested dimension has no representable byte length.
    #[error("vector dimension {dim} is too large")]
    DimensionOverflow {
        /// Requested dimension.
        dim: usize,
    },

    /// Text-protocol payload was not valid base64.
    #[error("invalid base64 vector payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

pub type CodecResult<T> = Result<T, CodecError>;
