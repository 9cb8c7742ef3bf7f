//! Error types for pdfcraft.
//!
//! Every failure that can cross the service boundary is one of a small,
//! fixed set of kinds. Library errors (`lopdf`, `image`, `pdfium-render`,
//! `zip`, `std::io`) are classified into one of these kinds where they
//! occur, so callers never have to inspect a third-party error type.
//!
//! # Error Categories
//!
//! - **Request errors**: unknown operation, invalid files or parameters
//! - **Input errors**: bytes the decoder rejects, wrong passwords
//! - **Storage errors**: missing or expired files, I/O failures

use std::fmt;
use std::io;

/// Result type alias for pdfcraft operations.
pub type Result<T> = std::result::Result<T, PdfCraftError>;

/// Main error type for pdfcraft operations.
#[derive(Debug, thiserror::Error)]
pub enum PdfCraftError {
    /// The requested operation is not registered.
    #[error("Unknown operation: '{name}'")]
    UnknownOperation {
        /// Name the client asked for.
        name: String,
    },

    /// The request is well-formed but cannot be processed as given.
    #[error("{reason}")]
    Validation {
        /// Human-readable reason, shown to the client.
        reason: String,
    },

    /// An uploaded file could not be decoded.
    #[error("Could not read '{name}': {details}")]
    MalformedInput {
        /// Client-supplied file name.
        name: String,
        /// Decoder message.
        details: String,
    },

    /// Decryption failed, or an encrypted input was given to an operation
    /// that needs the plain document.
    #[error("{message}")]
    InvalidPassword {
        /// Human-readable reason, shown to the client.
        message: String,
    },

    /// A storage identifier does not exist or has expired.
    #[error("File not found or expired: {id}")]
    NotFound {
        /// The identifier that was looked up.
        id: String,
    },

    /// The storage medium or a worker failed.
    #[error("I/O failure while {context}: {source}")]
    IoFailure {
        /// What the service was doing.
        context: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Coarse classification of a [`PdfCraftError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`PdfCraftError::UnknownOperation`].
    UnknownOperation,
    /// See [`PdfCraftError::Validation`].
    Validation,
    /// See [`PdfCraftError::MalformedInput`].
    MalformedInput,
    /// See [`PdfCraftError::InvalidPassword`].
    InvalidPassword,
    /// See [`PdfCraftError::NotFound`].
    NotFound,
    /// See [`PdfCraftError::IoFailure`].
    IoFailure,
}

impl ErrorKind {
    /// Stable identifier used in JSON error bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownOperation => "UnknownOperation",
            Self::Validation => "ValidationError",
            Self::MalformedInput => "MalformedInput",
            Self::InvalidPassword => "InvalidPassword",
            Self::NotFound => "NotFound",
            Self::IoFailure => "IOFailure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<io::Error> for PdfCraftError {
    fn from(err: io::Error) -> Self {
        Self::IoFailure {
            context: "accessing storage".to_string(),
            source: err,
        }
    }
}

impl PdfCraftError {
    /// Create an UnknownOperation error.
    pub fn unknown_operation(name: impl Into<String>) -> Self {
        Self::UnknownOperation { name: name.into() }
    }

    /// Create a Validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Create a MalformedInput error.
    pub fn malformed(name: impl Into<String>, details: impl fmt::Display) -> Self {
        Self::MalformedInput {
            name: name.into(),
            details: details.to_string(),
        }
    }

    /// Create an InvalidPassword error.
    pub fn invalid_password(message: impl Into<String>) -> Self {
        Self::InvalidPassword {
            message: message.into(),
        }
    }

    /// Create a NotFound error.
    pub fn not_found(id: impl fmt::Display) -> Self {
        Self::NotFound { id: id.to_string() }
    }

    /// Create an IoFailure from an I/O error.
    pub fn io_failure(context: impl Into<String>, source: io::Error) -> Self {
        Self::IoFailure {
            context: context.into(),
            source,
        }
    }

    /// Create an IoFailure for a failure that has no `io::Error` of its own,
    /// such as a panicked worker or a failed archive write.
    pub fn internal(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::IoFailure {
            context: context.into(),
            source: io::Error::other(message.to_string()),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownOperation { .. } => ErrorKind::UnknownOperation,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::MalformedInput { .. } => ErrorKind::MalformedInput,
            Self::InvalidPassword { .. } => ErrorKind::InvalidPassword,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::IoFailure { .. } => ErrorKind::IoFailure,
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::UnknownOperation | ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::MalformedInput | ErrorKind::InvalidPassword => 422,
            ErrorKind::IoFailure => 500,
        }
    }

    /// Check if the client caused this error.
    ///
    /// Client errors are reported verbatim; everything else is logged and
    /// replaced with a generic message at the HTTP boundary.
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}
