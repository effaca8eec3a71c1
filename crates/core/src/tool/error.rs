use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::io;

use serde::Serialize;

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// A folder or file could not be accessed.
    #[serde(rename = "IOError")]
    IoError,
    /// The requested artifact does not exist. This is a normal outcome.
    NotFound,
    /// The input provided to the tool was invalid, or the call is not
    /// allowed at this point of the session.
    ValidationError,
    /// An external AI service kept failing.
    ProviderError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::IoError => write!(f, "I/O error"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::ValidationError => write!(f, "Validation error"),
            ErrorKind::ProviderError => write!(f, "Provider error"),
        }
    }
}

/// Describes a tool call error.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    reason: Option<String>,
}

impl Error {
    /// Creates a new error with the `IoError` kind.
    #[inline]
    pub fn io() -> Self {
        Self::new(ErrorKind::IoError)
    }

    /// Creates a new error with the `NotFound` kind.
    #[inline]
    pub fn not_found() -> Self {
        Self::new(ErrorKind::NotFound)
    }

    /// Creates a new error with the `ValidationError` kind.
    #[inline]
    pub fn validation() -> Self {
        Self::new(ErrorKind::ValidationError)
    }

    /// Creates a new error with the `ProviderError` kind.
    #[inline]
    pub fn provider() -> Self {
        Self::new(ErrorKind::ProviderError)
    }

    #[inline]
    fn new(kind: ErrorKind) -> Self {
        Self { kind, reason: None }
    }

    /// Attaches a reason to the error.
    #[inline]
    pub fn with_reason<S: Into<String>>(self, reason: S) -> Self {
        Self {
            kind: self.kind,
            reason: Some(reason.into()),
        }
    }

    /// Returns the kind of the error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the reason for the error.
    #[inline]
    pub fn reason(&self) -> Cow<'_, str> {
        match self.reason.as_deref() {
            Some(reason) => Cow::Borrowed(reason),
            None => Cow::Owned(format!("{}", self.kind)),
        }
    }

    /// Wraps an I/O error that happened while doing `what`.
    pub(crate) fn from_io(what: impl Display, err: io::Error) -> Self {
        Self::io().with_reason(format!("{what}: {err}"))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{}: {reason}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl StdError for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_falls_back_to_kind() {
        let err = Error::not_found();
        assert_eq!(err.reason(), "Not found");

        let err = Error::validation().with_reason("description is empty");
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(err.reason(), "description is empty");
        assert_eq!(err.to_string(), "Validation error: description is empty");
    }

    #[test]
    fn test_envelope_names() {
        let names = [
            ErrorKind::IoError,
            ErrorKind::NotFound,
            ErrorKind::ValidationError,
            ErrorKind::ProviderError,
        ]
        .map(|kind| serde_json::to_value(kind).unwrap());
        assert_eq!(
            names,
            ["IOError", "NotFound", "ValidationError", "ProviderError"]
        );
    }
}
