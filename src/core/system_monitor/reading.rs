//! Tagged availability for every telemetry value.

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Why a value could not be produced.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnavailableReason {
    #[error("not supported on this platform")]
    NotSupportedOnPlatform,
    #[error("requires elevated privileges")]
    PermissionDenied,
    #[error("required tool is not installed")]
    ToolMissing,
    #[error("query failed")]
    QueryFailed,
    #[error("timed out")]
    Timeout,
}

impl From<&io::Error> for UnavailableReason {
    fn from(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => UnavailableReason::NotSupportedOnPlatform,
            io::ErrorKind::PermissionDenied => UnavailableReason::PermissionDenied,
            io::ErrorKind::TimedOut => UnavailableReason::Timeout,
            _ => UnavailableReason::QueryFailed,
        }
    }
}

impl From<io::Error> for UnavailableReason {
    fn from(err: io::Error) -> Self {
        UnavailableReason::from(&err)
    }
}

/// A value that is either present or explicitly missing with a reason.
///
/// Used both for whole domains in a [`Snapshot`](super::Snapshot) and for
/// individual sub-fields, so partial data survives a partial failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Reading<T> {
    Available(T),
    Unavailable(UnavailableReason),
}

impl<T> Reading<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Reading::Available(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Reading::Available(v) => Some(v),
            Reading::Unavailable(_) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Reading::Available(v) => Some(v),
            Reading::Unavailable(_) => None,
        }
    }

    pub fn reason(&self) -> Option<UnavailableReason> {
        match self {
            Reading::Available(_) => None,
            Reading::Unavailable(r) => Some(*r),
        }
    }

    pub fn as_ref(&self) -> Reading<&T> {
        match self {
            Reading::Available(v) => Reading::Available(v),
            Reading::Unavailable(r) => Reading::Unavailable(*r),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Reading<U> {
        match self {
            Reading::Available(v) => Reading::Available(f(v)),
            Reading::Unavailable(r) => Reading::Unavailable(r),
        }
    }

    pub fn and_then<U, F: FnOnce(T) -> Reading<U>>(self, f: F) -> Reading<U> {
        match self {
            Reading::Available(v) => f(v),
            Reading::Unavailable(r) => Reading::Unavailable(r),
        }
    }

    /// Keep the first available reading, otherwise try `f`.
    ///
    /// When both fail the reason of the fallback wins, since it was the last
    /// path attempted.
    pub fn or_else<F: FnOnce(UnavailableReason) -> Reading<T>>(self, f: F) -> Reading<T> {
        match self {
            Reading::Available(v) => Reading::Available(v),
            Reading::Unavailable(r) => f(r),
        }
    }

    /// Convert an `Option`, using `reason` when it is `None`.
    pub fn from_option(value: Option<T>, reason: UnavailableReason) -> Self {
        match value {
            Some(v) => Reading::Available(v),
            None => Reading::Unavailable(reason),
        }
    }
}

impl<T, E: Into<UnavailableReason>> From<std::result::Result<T, E>> for Reading<T> {
    fn from(result: std::result::Result<T, E>) -> Self {
        match result {
            Ok(v) => Reading::Available(v),
            Err(e) => Reading::Unavailable(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_mapping() {
        let not_found = io::Error::new(io::ErrorKind::NotFound, "gone");
        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        let other = io::Error::other("boom");

        assert_eq!(UnavailableReason::from(&not_found), UnavailableReason::NotSupportedOnPlatform);
        assert_eq!(UnavailableReason::from(&denied), UnavailableReason::PermissionDenied);
        assert_eq!(UnavailableReason::from(&other), UnavailableReason::QueryFailed);
    }

    #[test]
    fn test_or_else_keeps_available() {
        let reading: Reading<u32> = Reading::Available(3);
        let out = reading.or_else(|_| Reading::Available(9));
        assert_eq!(out, Reading::Available(3));
    }

    #[test]
    fn test_or_else_takes_fallback_reason() {
        let reading: Reading<u32> = Reading::Unavailable(UnavailableReason::ToolMissing);
        let out = reading.or_else(|_| Reading::Unavailable(UnavailableReason::QueryFailed));
        assert_eq!(out.reason(), Some(UnavailableReason::QueryFailed));
    }

    #[test]
    fn test_serialized_shape() {
        let reading: Reading<u32> = Reading::Unavailable(UnavailableReason::Timeout);
        let json = serde_json::to_string(&reading).unwrap();
        assert_eq!(json, r#"{"status":"unavailable","value":"Timeout"}"#);
    }
}
