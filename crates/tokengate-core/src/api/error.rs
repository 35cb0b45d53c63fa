use thiserror::Error;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Failure of a single request as seen by callers of the API layer.
///
/// `Clone` so that one outcome can be handed to every caller waiting on a
/// shared refresh.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {}: {}", .status, truncate_body(.body))]
    Http { status: u16, body: String },

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Truncate a response body to avoid logging excessive data
fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
}

impl RequestError {
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        RequestError::Http {
            status,
            body: body.into(),
        }
    }

    /// HTTP status of the response, if one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RequestError::Decode(err.to_string())
        } else if err.is_builder() {
            RequestError::InvalidRequest(err.to_string())
        } else {
            RequestError::Network(err.to_string())
        }
    }
}

/// Why a silent refresh did not produce a new credential.
///
/// `ReauthInterceptor::request` never surfaces it: it logs it, invalidates
/// the session and hands back the original 401.
#[derive(Error, Debug, Clone)]
pub enum RefreshFailure {
    #[error("refresh request failed: {0}")]
    Rejected(RequestError),

    #[error("refresh response did not contain an access token")]
    MissingCredential,

    #[error("refresh task aborted: {0}")]
    Aborted(String),
}

impl From<RefreshFailure> for RequestError {
    fn from(failure: RefreshFailure) -> Self {
        match failure {
            RefreshFailure::Rejected(e) => e,
            RefreshFailure::MissingCredential => {
                RequestError::Decode("refresh response has no accessToken".into())
            }
            RefreshFailure::Aborted(reason) => RequestError::Network(reason),
        }
    }
}
