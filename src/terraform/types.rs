//! Parameter payloads for the terraform-ls requests this bridge issues.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct InitializeParams {
    #[serde(rename = "processId")]
    pub process_id: Option<u32>,
    #[serde(rename = "rootUri")]
    pub root_uri: String,
    #[serde(rename = "workspaceFolders")]
    pub workspace_folders: Vec<WorkspaceFolder>,
    pub capabilities: ClientCapabilities,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceFolder {
    pub uri: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientCapabilities {
    #[serde(rename = "textDocument")]
    pub text_document: TextDocumentClientCapabilities,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextDocumentClientCapabilities {
    pub completion: CompletionClientCapabilities,
    pub hover: HoverClientCapabilities,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionClientCapabilities {
    #[serde(rename = "completionItem")]
    pub completion_item: CompletionItemClientCapabilities,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionItemClientCapabilities {
    #[serde(rename = "snippetSupport")]
    pub snippet_support: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HoverClientCapabilities {
    #[serde(rename = "contentFormat")]
    pub content_format: Vec<String>,
}

impl ClientCapabilities {
    /// The capability surface this bridge advertises: snippet completions
    /// and markdown or plaintext hover content.
    pub fn advertised() -> Self {
        Self {
            text_document: TextDocumentClientCapabilities {
                completion: CompletionClientCapabilities {
                    completion_item: CompletionItemClientCapabilities {
                        snippet_support: true,
                    },
                },
                hover: HoverClientCapabilities {
                    content_format: vec!["markdown".to_string(), "plaintext".to_string()],
                },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TextDocumentIdentifier {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextDocumentItem {
    pub uri: String,
    #[serde(rename = "languageId")]
    pub language_id: String,
    pub version: i64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DidOpenTextDocumentParams {
    #[serde(rename = "textDocument")]
    pub text_document: TextDocumentItem,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentDiagnosticParams {
    #[serde(rename = "textDocument")]
    pub text_document: TextDocumentIdentifier,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentFormattingParams {
    #[serde(rename = "textDocument")]
    pub text_document: TextDocumentIdentifier,
    pub options: FormattingOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormattingOptions {
    #[serde(rename = "tabSize")]
    pub tab_size: u32,
    #[serde(rename = "insertSpaces")]
    pub insert_spaces: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionParams {
    #[serde(rename = "textDocument")]
    pub text_document: TextDocumentIdentifier,
    pub position: Position,
}

/// Outcome of a validate operation: how many diagnostics the server
/// reported for the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationSummary {
    pub uri: String,
    pub diagnostics: usize,
}

/// Outcome of a format operation: how many text edits the server returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSummary {
    pub uri: String,
    pub edits: usize,
}

/// Outcome of a completion operation: how many suggestions the server
/// offered at the requested position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionSummary {
    pub uri: String,
    pub items: usize,
}
