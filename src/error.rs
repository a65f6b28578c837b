use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("API error: {0}")]
    Api(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("Failed to create session: {0}")]
    SessionCreate(String),

    #[error("Failed to rename session: {0}")]
    SessionRename(String),

    #[error("Failed to delete session: {0}")]
    SessionDelete(String),

    #[error("Failed to sync sessions: {0}")]
    SessionSync(String),

    #[error("Failed to load history: {0}")]
    HistoryLoad(String),

    #[error("Stream error: {0}")]
    StreamTransport(String),

    #[error("A message is already being sent")]
    Busy,

    #[error("cancelled")]
    Cancelled,

    #[error("{message}: {source}")]
    Context {
        message: String,
        #[source]
        source: Box<ChatError>,
    },
}

pub type Result<T> = std::result::Result<T, ChatError>;
