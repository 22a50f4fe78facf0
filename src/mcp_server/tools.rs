//! The tool table and its argument boundary.
//!
//! Tool arguments arrive as a loose JSON map; each tool has a typed argument
//! struct built by a validator that rejects missing or mistyped fields with
//! a message naming the field, before any subprocess I/O happens.

use serde_json::{Map, Value, json};
use std::path::PathBuf;

use crate::mcp_server::types::Tool;

pub const TERRAFORM_VALIDATE: &str = "terraform_validate";
pub const TERRAFORM_FORMAT: &str = "terraform_format";
pub const TERRAFORM_COMPLETION: &str = "terraform_completion";

/// The fixed tool list advertised by `tools/list`, in declaration order.
pub fn tool_descriptors() -> Vec<Tool> {
    vec![
        Tool {
            name: TERRAFORM_VALIDATE.to_string(),
            description: "Validate Terraform configuration files".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "workspace_path": {
                        "type": "string",
                        "description": "Path to the Terraform workspace directory"
                    },
                    "file_path": {
                        "type": "string",
                        "description": "Path to the specific Terraform file to validate"
                    },
                    "content": {
                        "type": "string",
                        "description": "Content of the Terraform file to validate"
                    }
                },
                "required": ["workspace_path", "file_path", "content"]
            }),
        },
        Tool {
            name: TERRAFORM_FORMAT.to_string(),
            description: "Format Terraform configuration files".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "workspace_path": {
                        "type": "string",
                        "description": "Path to the Terraform workspace directory"
                    },
                    "file_path": {
                        "type": "string",
                        "description": "Path to the specific Terraform file to format"
                    },
                    "content": {
                        "type": "string",
                        "description": "Content of the Terraform file to format"
                    }
                },
                "required": ["workspace_path", "file_path", "content"]
            }),
        },
        Tool {
            name: TERRAFORM_COMPLETION.to_string(),
            description: "Get completion suggestions for Terraform configuration".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "workspace_path": {
                        "type": "string",
                        "description": "Path to the Terraform workspace directory"
                    },
                    "file_path": {
                        "type": "string",
                        "description": "Path to the specific Terraform file"
                    },
                    "content": {
                        "type": "string",
                        "description": "Content of the Terraform file"
                    },
                    "line": {
                        "type": "integer",
                        "description": "Line number (0-based)"
                    },
                    "character": {
                        "type": "integer",
                        "description": "Character position (0-based)"
                    }
                },
                "required": ["workspace_path", "file_path", "content", "line", "character"]
            }),
        },
    ]
}

#[derive(Debug, Clone)]
pub struct ValidateArgs {
    pub workspace_path: PathBuf,
    pub file_path: PathBuf,
    pub content: String,
}

impl ValidateArgs {
    pub fn from_map(args: &Map<String, Value>) -> Result<Self, String> {
        Ok(Self {
            workspace_path: require_str(args, "workspace_path")?.into(),
            file_path: require_str(args, "file_path")?.into(),
            content: require_str(args, "content")?.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct FormatArgs {
    pub workspace_path: PathBuf,
    pub file_path: PathBuf,
    pub content: String,
}

impl FormatArgs {
    pub fn from_map(args: &Map<String, Value>) -> Result<Self, String> {
        Ok(Self {
            workspace_path: require_str(args, "workspace_path")?.into(),
            file_path: require_str(args, "file_path")?.into(),
            content: require_str(args, "content")?.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CompletionArgs {
    pub workspace_path: PathBuf,
    pub file_path: PathBuf,
    pub content: String,
    pub line: u32,
    pub character: u32,
}

impl CompletionArgs {
    pub fn from_map(args: &Map<String, Value>) -> Result<Self, String> {
        Ok(Self {
            workspace_path: require_str(args, "workspace_path")?.into(),
            file_path: require_str(args, "file_path")?.into(),
            content: require_str(args, "content")?.to_string(),
            line: require_u32(args, "line")?,
            character: require_u32(args, "character")?,
        })
    }
}

fn require_str<'a>(args: &'a Map<String, Value>, field: &str) -> Result<&'a str, String> {
    args.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("{field} is required and must be a string"))
}

fn require_u32(args: &Map<String, Value>, field: &str) -> Result<u32, String> {
    args.get(field)
        .and_then(Value::as_u64)
        .and_then(|value| u32::try_from(value).ok())
        .ok_or_else(|| format!("{field} is required and must be a number"))
}
