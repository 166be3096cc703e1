use thiserror::Error;

/// Failure reported by the backend collaborator for a single call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend rejected request with status {status}{}", fmt_message(.message))]
    Rejected {
        status: u16,
        message: Option<String>,
    },
    #[error("backend rejected credentials{}", fmt_message(.message))]
    Unauthorized { message: Option<String> },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("malformed backend response: {0}")]
    Decode(String),
}

fn fmt_message(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|message| format!(": {message}"))
        .unwrap_or_default()
}

impl BackendError {
    /// Human-readable message sent by the server, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Rejected { message, .. } | Self::Unauthorized { message } => message.as_deref(),
            Self::Transport(_) | Self::Decode(_) => None,
        }
    }

    pub fn is_stale_credentials(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Decode(_))
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse settings file '{path}': {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid api base url '{url}': {source}")]
    InvalidApiUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },
}
