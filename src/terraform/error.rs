use std::path::PathBuf;
use thiserror::Error;

use crate::lsp::LspError;

/// A bridge operation failure, carrying the operation that produced it.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("{operation} failed: {source}")]
    Lsp {
        operation: &'static str,
        #[source]
        source: LspError,
    },

    #[error("failed to resolve absolute path for {path:?}: {source}")]
    AbsolutePath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BridgeError {
    /// True when the failure is a deadline or teardown, as opposed to the
    /// server rejecting the request. Lets a retrying caller tell the two
    /// apart.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            BridgeError::Lsp {
                source: LspError::Timeout { .. } | LspError::SessionClosed,
                ..
            }
        )
    }
}
