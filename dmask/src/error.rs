//! # Mask errors

/// Errors produced while validating or analysing mask inputs.
#[derive(Debug, thiserror::Error)]
pub enum MaskError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Buffer too small: {buffer} needs {required} elements, got {actual}")]
    BufferTooSmall {
        buffer: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("Empty input: {what}")]
    Empty { what: &'static str },

    #[error("Mask was not filled and is empty")]
    NotFilled,
}

/// Result type alias using `MaskError`.
pub type MaskResult<T> = Result<T, MaskError>;

impl MaskError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: msg.into(),
        }
    }

    pub fn buffer_too_small(buffer: &'static str, required: usize, actual: usize) -> Self {
        Self::BufferTooSmall {
            buffer,
            required,
            actual,
        }
    }
}
