use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenError {
    /// Anything the model endpoint transport produced: network failure,
    /// non-2xx status, or a chunk that could not be decoded.
    #[error("model transport error: {message}")]
    Transport { status: Option<u16>, message: String },
    /// The reply could not be turned into structured data. `text` is the
    /// payload the parser was given.
    #[error("failed to parse model reply: {reason}")]
    Parse { reason: String, text: String },
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("no caller identity")]
    Unauthorized,
}

impl GenError {
    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        GenError::Transport { status, message: message.into() }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            GenError::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GenError {
    fn from(e: reqwest::Error) -> Self {
        GenError::Transport {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}
