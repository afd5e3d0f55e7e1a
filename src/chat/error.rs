use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ChatError {
    /// The completion or search endpoint failed.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Chat not found: {0}")]
    NotFound(String),

    /// Renaming is only allowed for the chat bound to the session.
    #[error("Chat {0} is not the active chat")]
    NotActive(String),

    /// A send is already waiting on its reply.
    #[error("A message is already being processed")]
    Busy,

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Title is empty")]
    EmptyTitle,
}

impl ChatError {
    pub fn upstream(err: anyhow::Error) -> Self {
        Self::UpstreamUnavailable(format!("{:#}", err))
    }
}

impl From<tokio_rusqlite::Error> for ChatError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::StoreUnavailable(format!("Malformed chat record: {}", err))
    }
}

impl From<chrono::ParseError> for ChatError {
    fn from(err: chrono::ParseError) -> Self {
        Self::StoreUnavailable(format!("Malformed timestamp: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
