//! Error types for the remote resource client.

use std::time::Duration;

/// Errors surfaced by the remote resource client and by cache reads that
/// depend on it.
///
/// The type is `Clone` so a single fetch result can be shared by every caller
/// joined onto a de-duplicated request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
  /// The request did not complete within the configured timeout.
  #[error("request timed out after {}ms", after.as_millis())]
  Timeout { after: Duration },

  /// Connection failure before any response was obtained.
  #[error("network error: {message}")]
  Network { message: String },

  /// The server answered with a non-2xx status.
  #[error("server returned {status}: {message}")]
  Remote { status: u16, message: String },

  /// The response body could not be decoded.
  #[error("invalid response: {message}")]
  Decode { message: String },

  /// The fetch was abandoned before its result was accepted.
  #[error("request was cancelled")]
  Cancelled,

  /// The client could not be constructed from its settings.
  #[error("client configuration error: {message}")]
  Config { message: String },
}

impl ClientError {
  /// HTTP status for `Remote` errors.
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Remote { status, .. } => Some(*status),
      _ => None,
    }
  }

  /// Whether a read may be retried by its caller.
  ///
  /// Transport failures and server-side (5xx) errors are retryable; client
  /// errors and cancellations are not.
  pub fn is_retryable(&self) -> bool {
    match self {
      Self::Timeout { .. } | Self::Network { .. } => true,
      Self::Remote { status, .. } => *status >= 500,
      Self::Decode { .. } | Self::Cancelled | Self::Config { .. } => false,
    }
  }

  /// Build an error from a `reqwest` transport failure.
  pub(crate) fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
    if err.is_timeout() {
      Self::Timeout { after: timeout }
    } else if err.is_decode() {
      Self::Decode {
        message: err.to_string(),
      }
    } else {
      Self::Network {
        message: err.to_string(),
      }
    }
  }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_retryable_kinds() {
    assert!(ClientError::Timeout {
      after: Duration::from_secs(1)
    }
    .is_retryable());
    assert!(ClientError::Network {
      message: "refused".into()
    }
    .is_retryable());
    assert!(ClientError::Remote {
      status: 503,
      message: "unavailable".into()
    }
    .is_retryable());
    assert!(!ClientError::Remote {
      status: 404,
      message: "Not found".into()
    }
    .is_retryable());
    assert!(!ClientError::Cancelled.is_retryable());
  }

  #[test]
  fn test_status_only_for_remote() {
    let err = ClientError::Remote {
      status: 404,
      message: "Not found".into(),
    };
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.to_string(), "server returned 404: Not found");
    assert_eq!(ClientError::Cancelled.status(), None);
  }

  #[test]
  fn test_timeout_display() {
    let err = ClientError::Timeout {
      after: Duration::from_millis(1500),
    };
    assert_eq!(err.to_string(), "request timed out after 1500ms");
  }
}
