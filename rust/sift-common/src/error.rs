use thiserror::Error;

/// The error type of all sift library crates.
///
/// Boxed so that `Result<T>` stays one pointer wide on the error path.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

pub type StdErrorBoxed = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ErrorKind {
    /// A caller passed a value outside the accepted domain.
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    /// A tunable or setting is unusable. Raised before any pipeline stage runs.
    #[error("invalid configuration {name}: {message}")]
    InvalidConfig { name: String, message: String },

    #[error("invalid operation {name}")]
    InvalidOperation { name: String },

    #[error("checksum mismatch for '{element}'")]
    ChecksumMismatch { element: String },

    /// Bytes on disk do not decode as the expected structure.
    #[error("invalid storage format for '{element}': {message}")]
    InvalidFormat { element: String, message: String },

    /// Input that decodes fine but breaks an ordering or uniqueness invariant,
    /// such as a duplicate key in sorted postings.
    #[error("inconsistent data: {message}")]
    Consistency { message: String },

    #[error("I/O error ({context}): {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Other {
        context: String,
        source: StdErrorBoxed,
    },
}

impl Error {
    fn new(kind: ErrorKind) -> Error {
        Error(Box::new(kind))
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn invalid_format_msg(element: impl Into<String>, message: impl Into<String>) -> Error {
        Error::new(ErrorKind::InvalidFormat {
            element: element.into(),
            message: message.into(),
        })
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error::new(ErrorKind::InvalidArgument {
            name: name.into(),
            message: message.into(),
        })
    }

    pub fn invalid_config(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error::new(ErrorKind::InvalidConfig {
            name: name.into(),
            message: message.into(),
        })
    }

    pub fn invalid_operation(name: impl Into<String>) -> Error {
        Error::new(ErrorKind::InvalidOperation { name: name.into() })
    }

    pub fn checksum_mismatch(element: impl Into<String>) -> Error {
        Error::new(ErrorKind::ChecksumMismatch {
            element: element.into(),
        })
    }

    pub fn consistency(message: impl Into<String>) -> Error {
        Error::new(ErrorKind::Consistency {
            message: message.into(),
        })
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error::new(ErrorKind::Io {
            context: context.into(),
            source,
        })
    }

    pub fn other<E>(context: impl Into<String>, source: E) -> Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::new(ErrorKind::Other {
            context: context.into(),
            source: Box::new(source),
        })
    }

    /// `true` for invalid tunables and arguments, as opposed to failures of the
    /// data or the environment.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidConfig { .. } | ErrorKind::InvalidArgument { .. }
        )
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io("unspecified", e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_arg("n_blocks", "must be at least 2");
        assert_eq!(
            err.to_string(),
            "invalid argument n_blocks: must be at least 2"
        );
        assert!(err.is_config_error());

        let err = Error::consistency("term 5 doc 3 follows term 5 doc 3");
        assert!(matches!(err.kind(), ErrorKind::Consistency { .. }));
        assert!(!err.is_config_error());

        let err = Error::io(
            "open sorted.bin",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert_eq!(err.to_string(), "I/O error (open sorted.bin): missing");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = Error::from(io_error);
        match err.into_kind() {
            ErrorKind::Io { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound)
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }
}
