//! Structured errors from the remote platform API.

use thiserror::Error;

/// Longest platform message kept in an error. Bodies can contain whole HTML pages.
const MAX_MESSAGE_LEN: usize = 500;

/// Failure of a single remote API call.
///
/// Keeps the HTTP status so callers can classify conflicts (`422 Reference
/// already exists`, `405`/`409` merge refusals) without re-parsing strings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The platform answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The request never produced a response (DNS, TLS, connect, timeout).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Build an HTTP error from a raw response body.
    pub fn from_response(status: u16, body: &str) -> Self {
        RemoteError::Http {
            status,
            message: platform_message(body),
        }
    }

    /// HTTP status, if the platform answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Ref or resource creation refused because it already exists.
    pub fn is_already_exists(&self) -> bool {
        match self {
            RemoteError::Http { status, message } => {
                *status == 422 && message.to_lowercase().contains("already exists")
            }
            _ => false,
        }
    }

    /// Merge refused: not mergeable (405) or head moved / conflict (409).
    pub fn is_merge_conflict(&self) -> bool {
        matches!(self.status(), Some(405) | Some(409))
    }

    /// Authentication or authorization refused.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }
}

/// Extract the human-readable message from a platform error body.
///
/// The platform returns `{"message": "...", "errors": [{"message": "..."}]}`;
/// anything else is kept verbatim (truncated).
pub(crate) fn platform_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();

    let message = parsed.as_ref().and_then(|value| {
        let top = value.get("message").and_then(|m| m.as_str())?;
        let detail = value
            .get("errors")
            .and_then(|e| e.as_array())
            .and_then(|errors| errors.first())
            .and_then(|first| first.get("message"))
            .and_then(|m| m.as_str());
        Some(match detail {
            Some(detail) if !detail.is_empty() => format!("{} ({})", top, detail),
            _ => top.to_string(),
        })
    });

    let message = message.unwrap_or_else(|| body.trim().to_string());
    truncate(&message, MAX_MESSAGE_LEN)
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
