//! Gateway dispatcher: routes inbound tool-call envelopes onto the
//! Terraform bridge and shapes every outcome, success or failure, into a
//! well-formed response envelope with a stable error code.

use serde_json::{Map, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error};

use crate::mcp_server::tools::{
    CompletionArgs, FormatArgs, TERRAFORM_COMPLETION, TERRAFORM_FORMAT, TERRAFORM_VALIDATE,
    ValidateArgs, tool_descriptors,
};
use crate::mcp_server::types::{
    CallToolParams, CallToolResult, INTERNAL_ERROR, INVALID_PARAMS, InitializeResult,
    ListToolsResult, METHOD_NOT_FOUND, McpRequest, McpResponse, ServerCapabilities, ServerInfo,
    ToolsCapability,
};
use crate::terraform::DocumentTools;

const PROTOCOL_VERSION: &str = "2024-11-05";

pub struct McpServer<B> {
    bridge: B,
}

impl<B: DocumentTools> McpServer<B> {
    pub fn new(bridge: B) -> Self {
        Self { bridge }
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    /// Serve envelopes from `reader` until it ends or a message cannot be
    /// decoded or delivered. One JSON envelope per line, responses written
    /// the same way.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let request: McpRequest = match serde_json::from_str(line) {
                Ok(request) => request,
                Err(e) => {
                    error!("failed to decode request envelope: {e}");
                    break;
                }
            };

            debug!(method = %request.method, "handling request");
            let response = self.handle_request(request).await;

            let encoded = match serde_json::to_string(&response) {
                Ok(encoded) => encoded,
                Err(e) => {
                    error!("failed to encode response envelope: {e}");
                    break;
                }
            };
            writer.write_all(encoded.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
        Ok(())
    }

    pub async fn handle_request(&self, request: McpRequest) -> McpResponse {
        match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id),
            "tools/list" => self.handle_list_tools(request.id),
            "tools/call" => self.handle_call_tool(request.id, request.params).await,
            method => McpResponse::error(
                request.id,
                METHOD_NOT_FOUND,
                format!("Method not found: {method}"),
            ),
        }
    }

    fn handle_initialize(&self, id: Value) -> McpResponse {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {},
            },
            server_info: ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };
        encode_result(id, &result)
    }

    fn handle_list_tools(&self, id: Value) -> McpResponse {
        let result = ListToolsResult {
            tools: tool_descriptors(),
        };
        encode_result(id, &result)
    }

    async fn handle_call_tool(&self, id: Value, params: Option<Value>) -> McpResponse {
        let params = match params.map(serde_json::from_value::<CallToolParams>) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return McpResponse::error(id, INVALID_PARAMS, format!("Invalid params: {e}"));
            }
            None => {
                return McpResponse::error(id, INVALID_PARAMS, "Invalid params: missing params");
            }
        };

        match params.name.as_str() {
            TERRAFORM_VALIDATE => self.call_validate(id, &params.arguments).await,
            TERRAFORM_FORMAT => self.call_format(id, &params.arguments).await,
            TERRAFORM_COMPLETION => self.call_completion(id, &params.arguments).await,
            other => McpResponse::error(id, INVALID_PARAMS, format!("Unknown tool: {other}")),
        }
    }

    async fn call_validate(&self, id: Value, arguments: &Map<String, Value>) -> McpResponse {
        let args = match ValidateArgs::from_map(arguments) {
            Ok(args) => args,
            Err(message) => return McpResponse::error(id, INVALID_PARAMS, message),
        };

        match self
            .bridge
            .validate_document(&args.workspace_path, &args.file_path, &args.content)
            .await
        {
            Ok(summary) => tool_text(
                id,
                format!(
                    "Validation completed for {}. Found {} diagnostic(s).",
                    args.file_path.display(),
                    summary.diagnostics
                ),
            ),
            Err(e) => McpResponse::error(id, INTERNAL_ERROR, e.to_string()),
        }
    }

    async fn call_format(&self, id: Value, arguments: &Map<String, Value>) -> McpResponse {
        let args = match FormatArgs::from_map(arguments) {
            Ok(args) => args,
            Err(message) => return McpResponse::error(id, INVALID_PARAMS, message),
        };

        match self
            .bridge
            .format_document(&args.workspace_path, &args.file_path, &args.content)
            .await
        {
            Ok(summary) => tool_text(
                id,
                format!(
                    "Formatting completed for {}. Applied {} edit(s).",
                    args.file_path.display(),
                    summary.edits
                ),
            ),
            Err(e) => McpResponse::error(id, INTERNAL_ERROR, e.to_string()),
        }
    }

    async fn call_completion(&self, id: Value, arguments: &Map<String, Value>) -> McpResponse {
        let args = match CompletionArgs::from_map(arguments) {
            Ok(args) => args,
            Err(message) => return McpResponse::error(id, INVALID_PARAMS, message),
        };

        match self
            .bridge
            .get_completion(
                &args.workspace_path,
                &args.file_path,
                &args.content,
                args.line,
                args.character,
            )
            .await
        {
            Ok(summary) => tool_text(
                id,
                format!(
                    "Completion completed for {} at line {}, character {}. Found {} suggestion(s).",
                    args.file_path.display(),
                    args.line,
                    args.character,
                    summary.items
                ),
            ),
            Err(e) => McpResponse::error(id, INTERNAL_ERROR, e.to_string()),
        }
    }
}

fn encode_result<T: serde::Serialize>(id: Value, result: &T) -> McpResponse {
    match serde_json::to_value(result) {
        Ok(value) => McpResponse::success(id, value),
        Err(e) => McpResponse::error(id, INTERNAL_ERROR, format!("failed to encode result: {e}")),
    }
}

fn tool_text(id: Value, text: String) -> McpResponse {
    encode_result(id, &CallToolResult::text(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsp::LspError;
    use crate::terraform::BridgeError;
    use crate::terraform::types::{CompletionSummary, FormatSummary, ValidationSummary};
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    /// Canned bridge: returns fixed summaries and records which operations
    /// were invoked, so dispatch can be tested without a subprocess.
    #[derive(Clone, Default)]
    struct MockBridge {
        calls: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl MockBridge {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn fail_if_asked(&self, operation: &'static str) -> Result<(), BridgeError> {
            if self.fail {
                Err(BridgeError::Lsp {
                    operation,
                    source: LspError::SessionClosed,
                })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl DocumentTools for MockBridge {
        async fn validate_document(
            &self,
            _workspace_root: &Path,
            file_path: &Path,
            _content: &str,
        ) -> Result<ValidationSummary, BridgeError> {
            self.calls.lock().unwrap().push("validate".to_string());
            self.fail_if_asked("validate document")?;
            Ok(ValidationSummary {
                uri: format!("file://{}", file_path.display()),
                diagnostics: 2,
            })
        }

        async fn format_document(
            &self,
            _workspace_root: &Path,
            file_path: &Path,
            _content: &str,
        ) -> Result<FormatSummary, BridgeError> {
            self.calls.lock().unwrap().push("format".to_string());
            self.fail_if_asked("format document")?;
            Ok(FormatSummary {
                uri: format!("file://{}", file_path.display()),
                edits: 3,
            })
        }

        async fn get_completion(
            &self,
            _workspace_root: &Path,
            file_path: &Path,
            _content: &str,
            _line: u32,
            _character: u32,
        ) -> Result<CompletionSummary, BridgeError> {
            self.calls.lock().unwrap().push("completion".to_string());
            self.fail_if_asked("get completion")?;
            Ok(CompletionSummary {
                uri: format!("file://{}", file_path.display()),
                items: 5,
            })
        }
    }

    fn request(id: u64, method: &str, params: Option<Value>) -> McpRequest {
        McpRequest {
            jsonrpc: "2.0".to_string(),
            id: json!(id),
            method: method.to_string(),
            params,
        }
    }

    fn call_params(name: &str, arguments: Value) -> Option<Value> {
        Some(json!({"name": name, "arguments": arguments}))
    }

    fn full_arguments() -> Value {
        json!({
            "workspace_path": "/ws",
            "file_path": "main.tf",
            "content": "resource {}",
        })
    }

    #[tokio::test]
    async fn initialize_reports_server_identity() {
        let server = McpServer::new(MockBridge::default());

        let response = server.handle_request(request(1, "initialize", None)).await;

        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], json!("2024-11-05"));
        assert_eq!(result["serverInfo"]["name"], json!("terraform-ls-mcp"));
    }

    #[tokio::test]
    async fn tools_list_returns_exactly_three_in_order() {
        let server = McpServer::new(MockBridge::default());

        let response = server.handle_request(request(2, "tools/list", None)).await;

        let result = response.result.unwrap();
        let tools = result["tools"].as_array().unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert_eq!(
            names,
            vec!["terraform_validate", "terraform_format", "terraform_completion"]
        );
    }

    #[tokio::test]
    async fn unknown_method_is_reported_with_its_name() {
        let server = McpServer::new(MockBridge::default());

        let response = server.handle_request(request(3, "foo", None)).await;

        let error = response.error.unwrap();
        assert_eq!(error.code, METHOD_NOT_FOUND);
        assert!(error.message.contains("foo"));
        assert_eq!(response.id, json!(3));
    }

    #[tokio::test]
    async fn missing_content_argument_is_rejected_by_name() {
        let server = McpServer::new(MockBridge::default());
        let params = call_params(
            "terraform_validate",
            json!({"workspace_path": "/ws", "file_path": "main.tf"}),
        );

        let response = server.handle_request(request(4, "tools/call", params)).await;

        let error = response.error.unwrap();
        assert_eq!(error.code, INVALID_PARAMS);
        assert!(error.message.contains("content"));
        // Argument errors never reach the bridge.
        assert!(server.bridge().calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected() {
        let server = McpServer::new(MockBridge::default());
        let params = call_params("bogus_tool", full_arguments());

        let response = server.handle_request(request(5, "tools/call", params)).await;

        let error = response.error.unwrap();
        assert_eq!(error.code, INVALID_PARAMS);
        assert!(error.message.contains("bogus_tool"));
    }

    #[tokio::test]
    async fn absent_params_are_invalid() {
        let server = McpServer::new(MockBridge::default());

        let response = server.handle_request(request(6, "tools/call", None)).await;

        assert_eq!(response.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn validate_call_produces_summary_text() {
        let server = McpServer::new(MockBridge::default());
        let params = call_params("terraform_validate", full_arguments());

        let response = server.handle_request(request(7, "tools/call", params)).await;

        let result = response.result.unwrap();
        let text = result["content"][0]["text"].as_str().unwrap();
        assert_eq!(text, "Validation completed for main.tf. Found 2 diagnostic(s).");
        assert_eq!(*server.bridge().calls.lock().unwrap(), vec!["validate"]);
    }

    #[tokio::test]
    async fn format_call_produces_summary_text() {
        let server = McpServer::new(MockBridge::default());
        let params = call_params("terraform_format", full_arguments());

        let response = server.handle_request(request(8, "tools/call", params)).await;

        let result = response.result.unwrap();
        let text = result["content"][0]["text"].as_str().unwrap();
        assert_eq!(text, "Formatting completed for main.tf. Applied 3 edit(s).");
    }

    #[tokio::test]
    async fn completion_call_produces_summary_text() {
        let server = McpServer::new(MockBridge::default());
        let mut arguments = full_arguments();
        arguments["line"] = json!(7);
        arguments["character"] = json!(13);
        let params = call_params("terraform_completion", arguments);

        let response = server.handle_request(request(9, "tools/call", params)).await;

        let result = response.result.unwrap();
        let text = result["content"][0]["text"].as_str().unwrap();
        assert_eq!(
            text,
            "Completion completed for main.tf at line 7, character 13. Found 5 suggestion(s)."
        );
    }

    #[tokio::test]
    async fn bridge_failure_becomes_internal_error() {
        let server = McpServer::new(MockBridge::failing());
        let params = call_params("terraform_validate", full_arguments());

        let response = server.handle_request(request(10, "tools/call", params)).await;

        let error = response.error.unwrap();
        assert_eq!(error.code, INTERNAL_ERROR);
        assert!(error.message.contains("validate document"));
    }

    #[tokio::test]
    async fn run_answers_each_envelope_on_its_own_line() {
        let server = McpServer::new(MockBridge::default());
        let input = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/list\"}\n\
                      {\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"nope\"}\n";
        let mut output = std::io::Cursor::new(Vec::new());

        server.run(&input[..], &mut output).await.unwrap();

        let written = String::from_utf8(output.into_inner()).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["result"]["tools"].as_array().unwrap().len(), 3);
        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["error"]["code"], json!(-32601));
    }

    #[tokio::test]
    async fn run_stops_on_undecodable_envelope() {
        let server = McpServer::new(MockBridge::default());
        let input = b"this is not json\n{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/list\"}\n";
        let mut output = std::io::Cursor::new(Vec::new());

        server.run(&input[..], &mut output).await.unwrap();

        assert!(output.into_inner().is_empty());
    }
}
