//! Bridge from tool-level operations to the terraform-ls protocol.
//!
//! Every tool call runs the same sequence: make sure the workspace is
//! initialized, derive the document URI from its absolute path, (re)open the
//! document with the supplied content, then issue the terminal request. The
//! server's response payloads are treated as opaque; the bridge only counts
//! their elements for the operation summary.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::lsp::{LspClient, LspError};
use crate::terraform::error::BridgeError;
use crate::terraform::types::{
    ClientCapabilities, CompletionParams, CompletionSummary, DidOpenTextDocumentParams,
    DocumentDiagnosticParams, DocumentFormattingParams, FormatSummary, FormattingOptions,
    InitializeParams, Position, TextDocumentIdentifier, TextDocumentItem, ValidationSummary,
    WorkspaceFolder,
};

/// Deadline applied to every language-server request issued by the bridge.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The Terraform authoring operations the gateway can invoke.
#[async_trait]
pub trait DocumentTools: Send + Sync {
    async fn validate_document(
        &self,
        workspace_root: &Path,
        file_path: &Path,
        content: &str,
    ) -> Result<ValidationSummary, BridgeError>;

    async fn format_document(
        &self,
        workspace_root: &Path,
        file_path: &Path,
        content: &str,
    ) -> Result<FormatSummary, BridgeError>;

    async fn get_completion(
        &self,
        workspace_root: &Path,
        file_path: &Path,
        content: &str,
        line: u32,
        character: u32,
    ) -> Result<CompletionSummary, BridgeError>;
}

#[derive(Default)]
struct WorkspaceState {
    /// Root the initialize/initialized handshake has been completed for.
    initialized_root: Option<PathBuf>,
    /// Version counter per document URI, incremented on every re-open.
    document_versions: HashMap<String, i64>,
}

pub struct TerraformClient {
    lsp: LspClient,
    state: Mutex<WorkspaceState>,
}

impl TerraformClient {
    /// Spawn `<server_path> serve` and bridge over its stdio.
    pub fn start(server_path: &str) -> Result<Self, LspError> {
        Ok(Self::new(LspClient::start(server_path, &["serve"])?))
    }

    /// Bridge over an already-running client. Used by tests to substitute
    /// in-memory streams for the subprocess.
    pub fn new(lsp: LspClient) -> Self {
        Self {
            lsp,
            state: Mutex::new(WorkspaceState::default()),
        }
    }

    pub async fn close(&self) {
        self.lsp.close().await;
    }

    /// Run the initialize/initialized handshake for `root` unless it has
    /// already been completed for that same root. A different root rebinds
    /// the session: the handshake runs again and replaces the stored root.
    async fn ensure_initialized(&self, root: &Path) -> Result<(), BridgeError> {
        let root = absolute_path(root)?;

        // The lock is held across the handshake so concurrent callers for
        // the same root observe exactly one initialize on the wire.
        let mut state = self.state.lock().await;
        match &state.initialized_root {
            Some(current) if *current == root => return Ok(()),
            Some(current) => warn!(
                "rebinding workspace from {} to {}",
                current.display(),
                root.display()
            ),
            None => debug!("initializing workspace {}", root.display()),
        }

        let root_uri = uri_for(&root);
        let folder_name = root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| root_uri.clone());
        let params = InitializeParams {
            process_id: None,
            root_uri: root_uri.clone(),
            workspace_folders: vec![WorkspaceFolder {
                uri: root_uri,
                name: folder_name,
            }],
            capabilities: ClientCapabilities::advertised(),
        };

        let response = self
            .lsp
            .request(
                "initialize",
                Some(encode("initialize workspace", &params)?),
                REQUEST_TIMEOUT,
            )
            .await
            .map_err(op("initialize workspace"))?;
        response.into_result().map_err(op("initialize workspace"))?;

        self.lsp
            .notify("initialized", Some(json!({})))
            .await
            .map_err(op("initialize workspace"))?;

        state.initialized_root = Some(root);
        Ok(())
    }

    /// Declare the document to the server with the supplied content. Each
    /// re-open of the same URI bumps the version so the server's document
    /// model stays monotonic.
    async fn open_document(&self, uri: &str, content: &str) -> Result<(), BridgeError> {
        let version = {
            let mut state = self.state.lock().await;
            let version = state
                .document_versions
                .entry(uri.to_string())
                .and_modify(|v| *v += 1)
                .or_insert(1);
            *version
        };

        let params = DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri: uri.to_string(),
                language_id: "terraform".to_string(),
                version,
                text: content.to_string(),
            },
        };
        self.lsp
            .notify("textDocument/didOpen", Some(encode("open document", &params)?))
            .await
            .map_err(op("open document"))
    }

    async fn prepare_document(
        &self,
        workspace_root: &Path,
        file_path: &Path,
        content: &str,
    ) -> Result<String, BridgeError> {
        self.ensure_initialized(workspace_root).await?;
        let uri = uri_for(&absolute_path(file_path)?);
        self.open_document(&uri, content).await?;
        Ok(uri)
    }
}

#[async_trait]
impl DocumentTools for TerraformClient {
    async fn validate_document(
        &self,
        workspace_root: &Path,
        file_path: &Path,
        content: &str,
    ) -> Result<ValidationSummary, BridgeError> {
        let uri = self.prepare_document(workspace_root, file_path, content).await?;

        let params = DocumentDiagnosticParams {
            text_document: TextDocumentIdentifier { uri: uri.clone() },
        };
        let response = self
            .lsp
            .request(
                "textDocument/diagnostic",
                Some(encode("validate document", &params)?),
                REQUEST_TIMEOUT,
            )
            .await
            .map_err(op("validate document"))?;
        let result = response.into_result().map_err(op("validate document"))?;

        Ok(ValidationSummary {
            uri,
            diagnostics: count_items(result.as_ref()),
        })
    }

    async fn format_document(
        &self,
        workspace_root: &Path,
        file_path: &Path,
        content: &str,
    ) -> Result<FormatSummary, BridgeError> {
        let uri = self.prepare_document(workspace_root, file_path, content).await?;

        let params = DocumentFormattingParams {
            text_document: TextDocumentIdentifier { uri: uri.clone() },
            options: FormattingOptions {
                tab_size: 2,
                insert_spaces: true,
            },
        };
        let response = self
            .lsp
            .request(
                "textDocument/formatting",
                Some(encode("format document", &params)?),
                REQUEST_TIMEOUT,
            )
            .await
            .map_err(op("format document"))?;
        let result = response.into_result().map_err(op("format document"))?;

        Ok(FormatSummary {
            uri,
            edits: count_items(result.as_ref()),
        })
    }

    async fn get_completion(
        &self,
        workspace_root: &Path,
        file_path: &Path,
        content: &str,
        line: u32,
        character: u32,
    ) -> Result<CompletionSummary, BridgeError> {
        let uri = self.prepare_document(workspace_root, file_path, content).await?;

        let params = CompletionParams {
            text_document: TextDocumentIdentifier { uri: uri.clone() },
            position: Position { line, character },
        };
        let response = self
            .lsp
            .request(
                "textDocument/completion",
                Some(encode("get completion", &params)?),
                REQUEST_TIMEOUT,
            )
            .await
            .map_err(op("get completion"))?;
        let result = response.into_result().map_err(op("get completion"))?;

        Ok(CompletionSummary {
            uri,
            items: count_items(result.as_ref()),
        })
    }
}

fn op(operation: &'static str) -> impl FnOnce(LspError) -> BridgeError {
    move |source| BridgeError::Lsp { operation, source }
}

fn encode<T: serde::Serialize>(operation: &'static str, params: &T) -> Result<Value, BridgeError> {
    serde_json::to_value(params).map_err(|e| BridgeError::Lsp {
        operation,
        source: e.into(),
    })
}

fn absolute_path(path: &Path) -> Result<PathBuf, BridgeError> {
    std::path::absolute(path).map_err(|source| BridgeError::AbsolutePath {
        path: path.to_path_buf(),
        source,
    })
}

fn uri_for(absolute: &Path) -> String {
    format!("file://{}", absolute.display())
}

/// Count the elements of an opaque result payload. Arrays count themselves;
/// objects count their `items` array (diagnostic reports and completion
/// lists both use that shape); anything else counts zero.
fn count_items(result: Option<&Value>) -> usize {
    match result {
        Some(Value::Array(items)) => items.len(),
        Some(Value::Object(fields)) => fields
            .get("items")
            .and_then(Value::as_array)
            .map_or(0, Vec::len),
        _ => 0,
    }
}
