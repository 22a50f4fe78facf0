use thiserror::Error;

#[derive(Error, Debug)]
pub enum LspError {
    #[error("language server binary '{0}' not found on PATH")]
    ServerNotFound(String),

    #[error("failed to start language server: {0}")]
    Spawn(std::io::Error),

    #[error("language server {0} pipe not available")]
    Pipe(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("request '{method}' timed out")]
    Timeout { method: String },

    #[error("session closed while waiting for a response")]
    SessionClosed,

    #[error("language server error {code}: {message}")]
    Remote { code: i32, message: String },
}
