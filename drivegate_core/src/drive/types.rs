use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GatewayError, Result};

/// Deserialize a tool argument map; missing or mistyped fields become validation errors.
pub fn parse_args<T: DeserializeOwned>(args: &Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(args.clone()))
        .map_err(|e| GatewayError::Validation(e.to_string()))
}

pub fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(GatewayError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

fn default_root() -> String {
    "/".to_string()
}

fn default_list_limit() -> u32 {
    100
}

fn default_search_limit() -> u32 {
    50
}

fn default_recent_days() -> i64 {
    7
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListFilesArgs {
    #[serde(default = "default_root")]
    pub folder_path: String,
    #[serde(default = "default_list_limit")]
    pub limit: u32,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateFolderArgs {
    pub name: String,
    #[serde(default = "default_root")]
    pub parent_path: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MoveFileArgs {
    pub file_id: String,
    #[serde(default)]
    pub new_parent_path: Option<String>,
    #[serde(default)]
    pub new_parent_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CopyFileArgs {
    pub file_id: String,
    #[serde(default = "default_root")]
    pub target_path: String,
    #[serde(default)]
    pub new_name: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileIdArgs {
    pub file_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchArgs {
    pub query: String,
    #[serde(default = "default_search_limit")]
    pub limit: u32,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchByDateArgs {
    pub start_date: String,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default = "default_search_limit")]
    pub limit: u32,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecentFilesArgs {
    #[serde(default = "default_recent_days")]
    pub days: i64,
    #[serde(default = "default_search_limit")]
    pub limit: u32,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// One `organize_files` rule. `action` stays a string so an unknown action
/// fails only its own rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizeRule {
    pub action: String,
    #[serde(default)]
    pub search_query: String,
    #[serde(default)]
    pub target_folder: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrganizeArgs {
    pub rules: Vec<OrganizeRule>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadArgs {
    pub target_path: String,
    #[serde(default)]
    pub local_path: Option<String>,
    #[serde(default)]
    pub content_base64: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DownloadArgs {
    pub file_id: String,
    #[serde(default)]
    pub local_path: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkTargetArgs {
    pub file_ids: Vec<String>,
    #[serde(default = "default_root")]
    pub target_path: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkIdsArgs {
    pub file_ids: Vec<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MoveLargeArgs {
    pub item_id: String,
    pub new_parent_id: String,
    #[serde(default)]
    pub drive_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CopyLargeArgs {
    pub source_drive_id: String,
    pub item_id: String,
    pub target_drive_id: String,
    pub target_parent_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PollArgs {
    pub monitor_url: String,
}

/// State of an asynchronous copy as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CopyStatus {
    Completed,
    InProgress,
    Failed,
}

impl CopyStatus {
    /// Graph reports `notStarted`, `inProgress`, `waiting`, `completed`, `failed`
    /// and a few rarer states; anything non-terminal counts as in progress.
    pub fn from_remote(status: &str) -> Self {
        match status {
            "completed" => CopyStatus::Completed,
            "failed" | "cancelled" | "deleteFailed" => CopyStatus::Failed,
            _ => CopyStatus::InProgress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_required_argument_is_validation_error() {
        let args = json!({"parent_path": "/Docs"});
        let err = parse_args::<CreateFolderArgs>(args.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, GatewayError::Validation(ref m) if m.contains("name")));
    }

    #[test]
    fn defaults_fill_optional_arguments() {
        let args = json!({});
        let parsed: ListFilesArgs = parse_args(args.as_object().unwrap()).unwrap();
        assert_eq!(parsed.folder_path, "/");
        assert_eq!(parsed.limit, 100);
        assert!(parsed.user_id.is_none());
    }

    #[test]
    fn copy_status_mapping_keeps_three_states() {
        assert_eq!(CopyStatus::from_remote("completed"), CopyStatus::Completed);
        assert_eq!(CopyStatus::from_remote("inProgress"), CopyStatus::InProgress);
        assert_eq!(CopyStatus::from_remote("notStarted"), CopyStatus::InProgress);
        assert_eq!(CopyStatus::from_remote("failed"), CopyStatus::Failed);
        assert_eq!(
            serde_json::to_value(CopyStatus::InProgress).unwrap(),
            json!("inProgress")
        );
    }
}
