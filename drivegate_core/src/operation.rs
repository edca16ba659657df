//! The fixed operation set and its dispatch onto [`DriveClient`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::GatewayConfig;
use crate::drive::types::*;
use crate::drive::{self, DriveClient};
use crate::error::{GatewayError, Result};
use crate::executor::GraphExecutor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListFiles,
    CreateFolder,
    MoveFile,
    CopyFile,
    DeleteFile,
    GetFileInfo,
    SearchFiles,
    SearchByDate,
    GetRecentFiles,
    OrganizeFiles,
    UploadFile,
    DownloadFile,
    BulkMove,
    BulkCopy,
    BulkDelete,
    MoveLargeFile,
    CopyLargeFile,
    PollCopyStatus,
}

impl Operation {
    pub const ALL: [Operation; 18] = [
        Operation::ListFiles,
        Operation::CreateFolder,
        Operation::MoveFile,
        Operation::CopyFile,
        Operation::DeleteFile,
        Operation::GetFileInfo,
        Operation::SearchFiles,
        Operation::SearchByDate,
        Operation::GetRecentFiles,
        Operation::OrganizeFiles,
        Operation::UploadFile,
        Operation::DownloadFile,
        Operation::BulkMove,
        Operation::BulkCopy,
        Operation::BulkDelete,
        Operation::MoveLargeFile,
        Operation::CopyLargeFile,
        Operation::PollCopyStatus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ListFiles => "list_files",
            Operation::CreateFolder => "create_folder",
            Operation::MoveFile => "move_file",
            Operation::CopyFile => "copy_file",
            Operation::DeleteFile => "delete_file",
            Operation::GetFileInfo => "get_file_info",
            Operation::SearchFiles => "search_files",
            Operation::SearchByDate => "search_by_date",
            Operation::GetRecentFiles => "get_recent_files",
            Operation::OrganizeFiles => "organize_files",
            Operation::UploadFile => "upload_file",
            Operation::DownloadFile => "download_file",
            Operation::BulkMove => "bulk_move",
            Operation::BulkCopy => "bulk_copy",
            Operation::BulkDelete => "bulk_delete",
            Operation::MoveLargeFile => "move_large_file",
            Operation::CopyLargeFile => "copy_large_file",
            Operation::PollCopyStatus => "poll_copy_status",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Operation::ListFiles => "List files and folders in a OneDrive folder",
            Operation::CreateFolder => "Create a folder; an existing name is auto-renamed",
            Operation::MoveFile => "Move a file or folder to another folder (by path or id)",
            Operation::CopyFile => "Copy a file to another folder, optionally renaming it",
            Operation::DeleteFile => "Delete a file or folder",
            Operation::GetFileInfo => "Get metadata for a file or folder",
            Operation::SearchFiles => "Search files by name or content",
            Operation::SearchByDate => "Find files modified within a date range",
            Operation::GetRecentFiles => "Find files modified in the last N days",
            Operation::OrganizeFiles => "Move or delete files matching search rules",
            Operation::UploadFile => "Upload a local file or inline content to a OneDrive path",
            Operation::DownloadFile => "Get a download URL for a file, optionally saving it locally",
            Operation::BulkMove => "Move several files to one folder",
            Operation::BulkCopy => "Copy several files to one folder",
            Operation::BulkDelete => "Delete several files",
            Operation::MoveLargeFile => "Server-side move of an item of any size",
            Operation::CopyLargeFile => "Start an asynchronous server-side copy, possibly across drives",
            Operation::PollCopyStatus => "Check the progress of an asynchronous copy",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        Operation::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| GatewayError::UnknownOperation(s.to_string()))
    }
}

/// A named invocation with its raw argument map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalOperation {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// Response envelope shared by the REST surface and the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

impl From<Result<Value>> for ToolOutcome {
    fn from(result: Result<Value>) -> Self {
        match result {
            Ok(data) => ToolOutcome::ok(data),
            Err(e) => ToolOutcome::failed(e.to_string()),
        }
    }
}

/// Entry point shared by every transport.
pub struct Gateway {
    drive: DriveClient,
}

impl Gateway {
    pub fn new(drive: DriveClient) -> Self {
        Self { drive }
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        config.validate()?;
        let executor = Arc::new(GraphExecutor::from_config(config)?);
        let drive = DriveClient::new(executor)
            .with_drive_id(config.graph.drive_id.clone())
            .with_default_user(config.graph.user_id.clone());
        Ok(Self::new(drive))
    }

    pub fn drive(&self) -> &DriveClient {
        &self.drive
    }

    pub async fn execute(&self, op: &LogicalOperation) -> Result<Value> {
        self.invoke(&op.name, &op.arguments).await
    }

    /// Run one named operation. Unknown names fail before any remote call.
    pub async fn invoke(&self, name: &str, args: &Map<String, Value>) -> Result<Value> {
        let op: Operation = name.parse()?;
        info!(operation = %op, "Invoking operation");
        let result = self.dispatch(op, args).await;
        if let Err(e) = &result {
            warn!(operation = %op, code = e.code_str(), "Operation failed: {}", e);
        }
        result
    }

    /// Same as [`Gateway::invoke`], rendered into the `{success, data|error}` envelope.
    pub async fn invoke_rendered(&self, name: &str, args: &Map<String, Value>) -> ToolOutcome {
        self.invoke(name, args).await.into()
    }

    async fn dispatch(&self, op: Operation, args: &Map<String, Value>) -> Result<Value> {
        let d = &self.drive;
        match op {
            Operation::ListFiles => {
                let a: ListFilesArgs = parse_args(args)?;
                d.list_files(&a.folder_path, a.limit, a.user_id.as_deref()).await
            }
            Operation::CreateFolder => {
                let a: CreateFolderArgs = parse_args(args)?;
                d.create_folder(&a.name, &a.parent_path, a.user_id.as_deref())
                    .await
            }
            Operation::MoveFile => {
                let a: MoveFileArgs = parse_args(args)?;
                d.move_file(
                    &a.file_id,
                    a.new_parent_path.as_deref(),
                    a.new_parent_id.as_deref(),
                    a.user_id.as_deref(),
                )
                .await
            }
            Operation::CopyFile => {
                let a: CopyFileArgs = parse_args(args)?;
                d.copy_file(
                    &a.file_id,
                    &a.target_path,
                    a.new_name.as_deref(),
                    a.user_id.as_deref(),
                )
                .await
            }
            Operation::DeleteFile => {
                let a: FileIdArgs = parse_args(args)?;
                d.delete_file(&a.file_id, a.user_id.as_deref()).await
            }
            Operation::GetFileInfo => {
                let a: FileIdArgs = parse_args(args)?;
                d.get_file_info(&a.file_id, a.user_id.as_deref()).await
            }
            Operation::SearchFiles => {
                let a: SearchArgs = parse_args(args)?;
                d.search_files(&a.query, a.limit, a.user_id.as_deref()).await
            }
            Operation::SearchByDate => {
                let a: SearchByDateArgs = parse_args(args)?;
                d.search_by_date(
                    &a.start_date,
                    a.end_date.as_deref(),
                    a.limit,
                    a.user_id.as_deref(),
                )
                .await
            }
            Operation::GetRecentFiles => {
                let a: RecentFilesArgs = parse_args(args)?;
                d.get_recent_files(a.days, a.limit, a.user_id.as_deref())
                    .await
            }
            Operation::OrganizeFiles => {
                let a: OrganizeArgs = parse_args(args)?;
                d.organize_files(&a.rules, a.user_id.as_deref()).await
            }
            Operation::UploadFile => {
                let a: UploadArgs = parse_args(args)?;
                let data = drive::upload_payload(&a).await?;
                d.upload_file(&a.target_path, data, a.user_id.as_deref())
                    .await
            }
            Operation::DownloadFile => {
                let a: DownloadArgs = parse_args(args)?;
                self.download(a).await
            }
            Operation::BulkMove => {
                let a: BulkTargetArgs = parse_args(args)?;
                Ok(d.bulk_move(&a.file_ids, &a.target_path, a.user_id.as_deref())
                    .await?
                    .to_value())
            }
            Operation::BulkCopy => {
                let a: BulkTargetArgs = parse_args(args)?;
                Ok(d.bulk_copy(&a.file_ids, &a.target_path, a.user_id.as_deref())
                    .await?
                    .to_value())
            }
            Operation::BulkDelete => {
                let a: BulkIdsArgs = parse_args(args)?;
                Ok(d.bulk_delete(&a.file_ids, a.user_id.as_deref())
                    .await?
                    .to_value())
            }
            Operation::MoveLargeFile => {
                let a: MoveLargeArgs = parse_args(args)?;
                d.move_large_file(a.drive_id.as_deref(), &a.item_id, &a.new_parent_id)
                    .await
            }
            Operation::CopyLargeFile => {
                let a: CopyLargeArgs = parse_args(args)?;
                d.copy_large_file(
                    &a.source_drive_id,
                    &a.item_id,
                    &a.target_drive_id,
                    &a.target_parent_id,
                )
                .await
            }
            Operation::PollCopyStatus => {
                let a: PollArgs = parse_args(args)?;
                d.poll_copy_status(&a.monitor_url).await
            }
        }
    }

    async fn download(&self, args: DownloadArgs) -> Result<Value> {
        let mut meta = self
            .drive
            .download_file(&args.file_id, args.user_id.as_deref())
            .await?;
        let Some(local_path) = args.local_path.filter(|p| !p.trim().is_empty()) else {
            return Ok(meta);
        };
        let url = meta
            .get("downloadUrl")
            .and_then(|u| u.as_str())
            .map(str::to_string)
            .unwrap_or_default();
        let bytes = self.drive.fetch_content(&url).await?;
        tokio::fs::write(&local_path, &bytes).await?;
        meta["localPath"] = json!(local_path);
        meta["bytes_written"] = json!(bytes.len());
        Ok(meta)
    }
}
