use std::fmt::{self, Display};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The content is moderated.
    Moderated,
    /// The provider refused the request itself, like a bad credential, a
    /// missing model or an invalid parameter.
    Rejected,
    /// The model provider is rate limited.
    RateLimitExceeded,
    /// The provider did not answer in time.
    Timeout,
    /// The provider answered with something that cannot be used.
    InvalidResponse,
    /// Any other errors, including network failures.
    Other,
}

impl ErrorKind {
    /// Returns `true` if sending the same request again may succeed.
    ///
    /// Moderated and rejected requests are permanent, sending them again
    /// yields the same answer.
    #[inline]
    pub fn is_transient(self) -> bool {
        !matches!(self, ErrorKind::Moderated | ErrorKind::Rejected)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Moderated => write!(f, "moderated"),
            ErrorKind::Rejected => write!(f, "rejected"),
            ErrorKind::RateLimitExceeded => write!(f, "rate limit exceeded"),
            ErrorKind::Timeout => write!(f, "timed out"),
            ErrorKind::InvalidResponse => write!(f, "invalid response"),
            ErrorKind::Other => write!(f, "provider failure"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_kinds() {
        assert!(!ErrorKind::Moderated.is_transient());
        assert!(!ErrorKind::Rejected.is_transient());
        assert!(ErrorKind::RateLimitExceeded.is_transient());
        assert!(ErrorKind::Timeout.is_transient());
        assert!(ErrorKind::InvalidResponse.is_transient());
        assert!(ErrorKind::Other.is_transient());
    }
}
