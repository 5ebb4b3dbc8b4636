//! Error taxonomy shared by every stage of the loader.
//!
//! Format problems (bad container, bad header, unknown enumeration codes,
//! out-of-range accessors) are always fatal to the parse in progress. I/O
//! failures come from the fetch collaborator and are passed through verbatim.

use std::io;

use thiserror::Error;

/// Errors that can occur while reading a glTF document or GLB container.
#[derive(Error, Debug)]
pub enum GltfError {
    #[error("Invalid glTF: {0}")]
    Format(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Metadata is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Compressed geometry decode error (mesh {mesh}, primitive {primitive}): {message}")]
    Decode {
        mesh: usize,
        primitive: usize,
        message: String,
    },
}

impl GltfError {
    /// Shorthand for [`GltfError::Format`].
    pub fn format(message: impl Into<String>) -> Self {
        GltfError::Format(message.into())
    }

    /// Malformed input rather than a transport or decoder failure.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            GltfError::Format(_) | GltfError::Json(_) | GltfError::Utf8(_)
        )
    }

    pub fn is_io_error(&self) -> bool {
        matches!(self, GltfError::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, GltfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(GltfError::format("bad").is_format_error());
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(GltfError::from(json_err).is_format_error());

        let io_err = GltfError::from(io::Error::new(io::ErrorKind::NotFound, "missing"));
        assert!(io_err.is_io_error());
        assert!(!io_err.is_format_error());
    }

    #[test]
    fn test_decode_message_carries_context() {
        let err = GltfError::Decode {
            mesh: 2,
            primitive: 1,
            message: "corrupt stream".into(),
        };
        let text = err.to_string();
        assert!(text.contains("mesh 2"));
        assert!(text.contains("primitive 1"));
        assert!(text.contains("corrupt stream"));
    }
}
