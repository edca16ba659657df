use rmcp::model::{JsonObject, Tool};
use serde_json::{json, Value};
use std::borrow::Cow;
use std::sync::Arc;

use crate::operation::Operation;

fn object_schema(schema: Value) -> Arc<JsonObject> {
    match schema {
        Value::Object(map) => Arc::new(map),
        _ => Arc::new(JsonObject::new()),
    }
}

fn user_id() -> Value {
    json!({"type": "string", "description": "User whose drive to use (defaults to the configured user)"})
}

fn input_schema(op: Operation) -> Value {
    match op {
        Operation::ListFiles => json!({
            "type": "object",
            "properties": {
                "folder_path": {"type": "string", "default": "/", "description": "Folder path, '/' for root"},
                "limit": {"type": "integer", "default": 100, "minimum": 1},
                "user_id": user_id(),
            }
        }),
        Operation::CreateFolder => json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "parent_path": {"type": "string", "default": "/"},
                "user_id": user_id(),
            },
            "required": ["name"]
        }),
        Operation::MoveFile => json!({
            "type": "object",
            "properties": {
                "file_id": {"type": "string"},
                "new_parent_path": {"type": "string", "description": "Destination folder path"},
                "new_parent_id": {"type": "string", "description": "Destination folder id (skips path lookup)"},
                "user_id": user_id(),
            },
            "required": ["file_id"]
        }),
        Operation::CopyFile => json!({
            "type": "object",
            "properties": {
                "file_id": {"type": "string"},
                "target_path": {"type": "string", "default": "/"},
                "new_name": {"type": "string"},
                "user_id": user_id(),
            },
            "required": ["file_id"]
        }),
        Operation::DeleteFile | Operation::GetFileInfo => json!({
            "type": "object",
            "properties": {
                "file_id": {"type": "string"},
                "user_id": user_id(),
            },
            "required": ["file_id"]
        }),
        Operation::SearchFiles => json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "limit": {"type": "integer", "default": 50, "minimum": 1},
                "user_id": user_id(),
            },
            "required": ["query"]
        }),
        Operation::SearchByDate => json!({
            "type": "object",
            "properties": {
                "start_date": {"type": "string", "description": "YYYY-MM-DD or RFC 3339"},
                "end_date": {"type": "string", "description": "YYYY-MM-DD or RFC 3339 (inclusive)"},
                "limit": {"type": "integer", "default": 50, "minimum": 1},
                "user_id": user_id(),
            },
            "required": ["start_date"]
        }),
        Operation::GetRecentFiles => json!({
            "type": "object",
            "properties": {
                "days": {"type": "integer", "default": 7, "minimum": 0},
                "limit": {"type": "integer", "default": 50, "minimum": 1},
                "user_id": user_id(),
            }
        }),
        Operation::OrganizeFiles => json!({
            "type": "object",
            "properties": {
                "rules": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "action": {"type": "string", "enum": ["move", "delete"]},
                            "search_query": {"type": "string"},
                            "target_folder": {"type": "string"}
                        },
                        "required": ["action", "search_query"]
                    }
                },
                "user_id": user_id(),
            },
            "required": ["rules"]
        }),
        Operation::UploadFile => json!({
            "type": "object",
            "properties": {
                "target_path": {"type": "string", "description": "Destination path including the file name"},
                "local_path": {"type": "string"},
                "content_base64": {"type": "string"},
                "content": {"type": "string", "description": "Inline UTF-8 text content"},
                "user_id": user_id(),
            },
            "required": ["target_path"]
        }),
        Operation::DownloadFile => json!({
            "type": "object",
            "properties": {
                "file_id": {"type": "string"},
                "local_path": {"type": "string", "description": "Write the content here when given"},
                "user_id": user_id(),
            },
            "required": ["file_id"]
        }),
        Operation::BulkMove | Operation::BulkCopy => json!({
            "type": "object",
            "properties": {
                "file_ids": {"type": "array", "items": {"type": "string"}},
                "target_path": {"type": "string", "default": "/"},
                "user_id": user_id(),
            },
            "required": ["file_ids"]
        }),
        Operation::BulkDelete => json!({
            "type": "object",
            "properties": {
                "file_ids": {"type": "array", "items": {"type": "string"}},
                "user_id": user_id(),
            },
            "required": ["file_ids"]
        }),
        Operation::MoveLargeFile => json!({
            "type": "object",
            "properties": {
                "item_id": {"type": "string"},
                "new_parent_id": {"type": "string"},
                "drive_id": {"type": "string"}
            },
            "required": ["item_id", "new_parent_id"]
        }),
        Operation::CopyLargeFile => json!({
            "type": "object",
            "properties": {
                "source_drive_id": {"type": "string"},
                "item_id": {"type": "string"},
                "target_drive_id": {"type": "string"},
                "target_parent_id": {"type": "string"}
            },
            "required": ["source_drive_id", "item_id", "target_drive_id", "target_parent_id"]
        }),
        Operation::PollCopyStatus => json!({
            "type": "object",
            "properties": {
                "monitor_url": {"type": "string", "description": "monitorUrl returned by copy_large_file"}
            },
            "required": ["monitor_url"]
        }),
    }
}

pub fn tool_for(op: Operation) -> Tool {
    Tool {
        name: Cow::Borrowed(op.as_str()),
        title: None,
        description: Some(Cow::Borrowed(op.description())),
        input_schema: object_schema(input_schema(op)),
        output_schema: None,
        annotations: None,
        icons: None,
    }
}

/// Descriptors for every operation, in catalog order.
pub fn catalog() -> Vec<Tool> {
    Operation::ALL.iter().copied().map(tool_for).collect()
}
