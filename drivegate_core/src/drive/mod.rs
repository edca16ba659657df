//! OneDrive operations expressed as Graph requests.

pub mod paths;
pub mod types;

use base64::Engine as _;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::bulk::{self, BulkResult};
use crate::error::{GatewayError, Result};
use crate::executor::{GraphExecutor, RemoteRequest};
use paths::{ITEM_DETAIL_FIELDS, ITEM_FIELDS, ROOT_ITEM_ID};
use types::{CopyStatus, OrganizeRule};

/// Largest payload sent as a single PUT.
pub const SIMPLE_UPLOAD_LIMIT: usize = 4 * 1024 * 1024;
/// Upload session chunk; Graph requires multiples of 320 KiB.
pub const UPLOAD_CHUNK_SIZE: usize = 32 * 320 * 1024;
const CONFLICT_BEHAVIOR: &str = "@microsoft.graph.conflictBehavior";

pub struct DriveClient {
    executor: Arc<GraphExecutor>,
    drive_id: Option<String>,
    default_user: Option<String>,
    simple_upload_limit: usize,
    upload_chunk_size: usize,
}

impl DriveClient {
    pub fn new(executor: Arc<GraphExecutor>) -> Self {
        Self {
            executor,
            drive_id: None,
            default_user: None,
            simple_upload_limit: SIMPLE_UPLOAD_LIMIT,
            upload_chunk_size: UPLOAD_CHUNK_SIZE,
        }
    }

    /// Operate on a fixed drive; skips user and drive lookups.
    pub fn with_drive_id(mut self, drive_id: Option<String>) -> Self {
        self.drive_id = drive_id;
        self
    }

    pub fn with_default_user(mut self, user_id: Option<String>) -> Self {
        self.default_user = user_id;
        self
    }

    pub fn with_upload_limits(mut self, simple_limit: usize, chunk_size: usize) -> Self {
        self.simple_upload_limit = simple_limit;
        self.upload_chunk_size = chunk_size.max(1);
        self
    }

    pub fn executor(&self) -> &Arc<GraphExecutor> {
        &self.executor
    }

    // --- drive addressing ---

    /// Graph path prefix of the drive the call operates on.
    pub async fn drive_base(&self, user_id: Option<&str>) -> Result<String> {
        if let Some(id) = &self.drive_id {
            return Ok(format!("/drives/{}", id));
        }
        let user = user_id
            .map(str::to_string)
            .or_else(|| self.default_user.clone());
        let user = match user {
            Some(u) => u,
            None if self.executor.tokens().credentials().is_delegated() => {
                return Ok("/me/drive".to_string());
            }
            None => self.first_user_id().await?,
        };

        let drives = self
            .executor
            .execute_json(RemoteRequest::get(format!("/users/{}/drives", user)))
            .await?;
        let id = first_id(&drives)
            .ok_or_else(|| GatewayError::Remote {
                status: 404,
                message: format!("No drives found for user {}", user),
            })?;
        Ok(format!("/drives/{}", id))
    }

    async fn first_user_id(&self) -> Result<String> {
        let users = self
            .executor
            .execute_json(
                RemoteRequest::get("/users")
                    .query("$top", 1)
                    .query("$select", "id"),
            )
            .await?;
        first_id(&users).ok_or_else(|| GatewayError::Remote {
            status: 404,
            message: "No users found in the organization".to_string(),
        })
    }

    /// Folder id for a path. The root maps to the sentinel without a lookup.
    pub async fn resolve_folder_id(&self, drive: &str, path: &str) -> Result<String> {
        if paths::is_root(path) {
            return Ok(ROOT_ITEM_ID.to_string());
        }
        let item = self
            .executor
            .execute_json(
                RemoteRequest::get(paths::item_path(drive, path)).query("$select", "id,name,folder"),
            )
            .await?;
        if item.get("folder").is_none() {
            return Err(GatewayError::Validation(format!(
                "'{}' is not a folder",
                path
            )));
        }
        item_id(&item).ok_or_else(|| GatewayError::Remote {
            status: 502,
            message: format!("Graph returned no id for '{}'", path),
        })
    }

    /// Look the folder up and create it when missing.
    async fn ensure_folder(&self, drive: &str, path: &str) -> Result<String> {
        match self.resolve_folder_id(drive, path).await {
            Ok(id) => Ok(id),
            Err(e) if e.is_not_found() => {
                let (parent, name) = paths::split_parent(path).ok_or_else(|| {
                    GatewayError::Validation(format!("invalid folder path '{}'", path))
                })?;
                info!(folder = %path, "Creating missing target folder");
                let created = self.create_folder_in(drive, &name, &parent).await?;
                item_id(&created).ok_or_else(|| GatewayError::Remote {
                    status: 502,
                    message: format!("Graph returned no id for new folder '{}'", path),
                })
            }
            Err(e) => Err(e),
        }
    }

    // --- single-item operations ---

    pub async fn list_files(
        &self,
        folder_path: &str,
        limit: u32,
        user_id: Option<&str>,
    ) -> Result<Value> {
        let drive = self.drive_base(user_id).await?;
        self.executor
            .execute_json(
                RemoteRequest::get(paths::children_path(&drive, folder_path))
                    .query("$top", limit)
                    .query("$select", ITEM_FIELDS),
            )
            .await
    }

    pub async fn create_folder(
        &self,
        name: &str,
        parent_path: &str,
        user_id: Option<&str>,
    ) -> Result<Value> {
        types::require("name", name)?;
        let drive = self.drive_base(user_id).await?;
        self.create_folder_in(&drive, name, parent_path).await
    }

    async fn create_folder_in(&self, drive: &str, name: &str, parent_path: &str) -> Result<Value> {
        let payload = json!({
            "name": name,
            "folder": {},
            CONFLICT_BEHAVIOR: "rename",
        });
        self.executor
            .execute_json(RemoteRequest::post(paths::children_path(drive, parent_path)).json(payload))
            .await
    }

    /// Move by id (`new_parent_id`) or by path. Path resolution and the PATCH are
    /// two separate calls; a target that disappears in between fails the PATCH.
    pub async fn move_file(
        &self,
        file_id: &str,
        new_parent_path: Option<&str>,
        new_parent_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<Value> {
        types::require("file_id", file_id)?;
        let drive = self.drive_base(user_id).await?;
        let parent_id = match (new_parent_id, new_parent_path) {
            (Some(id), _) if !id.trim().is_empty() => id.to_string(),
            (_, Some(path)) => self.resolve_folder_id(&drive, path).await?,
            _ => {
                return Err(GatewayError::Validation(
                    "new_parent_path or new_parent_id is required".to_string(),
                ))
            }
        };
        self.move_item(&drive, file_id, &parent_id).await
    }

    async fn move_item(&self, drive: &str, file_id: &str, parent_id: &str) -> Result<Value> {
        self.executor
            .execute_json(
                RemoteRequest::patch(format!("{}/items/{}", drive, file_id))
                    .json(json!({ "parentReference": { "id": parent_id } })),
            )
            .await
    }

    pub async fn copy_file(
        &self,
        file_id: &str,
        target_path: &str,
        new_name: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<Value> {
        types::require("file_id", file_id)?;
        let drive = self.drive_base(user_id).await?;
        let parent_id = self.resolve_folder_id(&drive, target_path).await?;
        self.copy_item(&drive, file_id, &parent_id, new_name).await
    }

    async fn copy_item(
        &self,
        drive: &str,
        file_id: &str,
        parent_id: &str,
        new_name: Option<&str>,
    ) -> Result<Value> {
        let mut parent = json!({ "id": parent_id });
        if let Some(drive_id) = drive.strip_prefix("/drives/") {
            parent["driveId"] = json!(drive_id);
        }
        let mut payload = json!({ "parentReference": parent });
        if let Some(name) = new_name.filter(|n| !n.trim().is_empty()) {
            payload["name"] = json!(name);
        }

        let resp = self
            .executor
            .execute(
                RemoteRequest::post(format!("{}/items/{}/copy", drive, file_id))
                    .query(CONFLICT_BEHAVIOR, "rename")
                    .json(payload),
            )
            .await?;

        let accepted = resp.is_empty() || resp.status == 202;
        match resp.location.as_deref() {
            Some(monitor_url) if accepted => Ok(json!({
                "status": "pending",
                "monitorUrl": monitor_url,
                "operationId": paths::last_segment(monitor_url),
            })),
            _ => resp.json(),
        }
    }

    pub async fn delete_file(&self, file_id: &str, user_id: Option<&str>) -> Result<Value> {
        types::require("file_id", file_id)?;
        let drive = self.drive_base(user_id).await?;
        self.delete_item(&drive, file_id).await
    }

    async fn delete_item(&self, drive: &str, file_id: &str) -> Result<Value> {
        self.executor
            .execute(RemoteRequest::delete(format!("{}/items/{}", drive, file_id)))
            .await?;
        Ok(json!({ "id": file_id, "deleted": true }))
    }

    pub async fn get_file_info(&self, file_id: &str, user_id: Option<&str>) -> Result<Value> {
        types::require("file_id", file_id)?;
        let drive = self.drive_base(user_id).await?;
        self.executor
            .execute_json(
                RemoteRequest::get(format!("{}/items/{}", drive, file_id))
                    .query("$select", ITEM_DETAIL_FIELDS),
            )
            .await
    }

    // --- search ---

    pub async fn search_files(&self, query: &str, limit: u32, user_id: Option<&str>) -> Result<Value> {
        types::require("query", query)?;
        let drive = self.drive_base(user_id).await?;
        self.search_in(&drive, query, limit).await
    }

    async fn search_in(&self, drive: &str, query: &str, limit: u32) -> Result<Value> {
        self.executor
            .execute_json(
                RemoteRequest::get(paths::search_path(drive, query))
                    .query("$top", limit)
                    .query("$select", ITEM_FIELDS),
            )
            .await
    }

    pub async fn search_by_date(
        &self,
        start_date: &str,
        end_date: Option<&str>,
        limit: u32,
        user_id: Option<&str>,
    ) -> Result<Value> {
        let start = paths::parse_date_bound(start_date, false)?;
        let end = end_date
            .filter(|s| !s.trim().is_empty())
            .map(|s| paths::parse_date_bound(s, true))
            .transpose()?;
        if let Some(end) = end {
            if end < start {
                return Err(GatewayError::Validation(
                    "end_date is before start_date".to_string(),
                ));
            }
        }
        self.modified_since(paths::modified_filter(start, end), limit, user_id)
            .await
    }

    /// Files modified in the last `days`, measured from the moment of the call.
    pub async fn get_recent_files(&self, days: i64, limit: u32, user_id: Option<&str>) -> Result<Value> {
        let since = ChronoDuration::try_days(days)
            .filter(|_| days >= 0)
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .ok_or_else(|| GatewayError::Validation(format!("days out of range: {}", days)))?;
        self.modified_since(paths::modified_filter(since, None), limit, user_id)
            .await
    }

    async fn modified_since(&self, filter: String, limit: u32, user_id: Option<&str>) -> Result<Value> {
        let drive = self.drive_base(user_id).await?;
        debug!(filter = %filter, "Date-filtered search");
        self.executor
            .execute_json(
                RemoteRequest::get(paths::search_path(&drive, ""))
                    .query("$filter", filter)
                    .query("$top", limit)
                    .query("$select", ITEM_FIELDS),
            )
            .await
    }

    // --- rule-driven organization ---

    pub async fn organize_files(&self, rules: &[OrganizeRule], user_id: Option<&str>) -> Result<Value> {
        if rules.is_empty() {
            return Err(GatewayError::Validation(
                "Organization rules are required".to_string(),
            ));
        }
        let drive = self.drive_base(user_id).await?;
        let mut results = Vec::new();

        for rule in rules {
            match self.apply_rule(&drive, rule).await {
                Ok(mut entries) => results.append(&mut entries),
                Err(e) => {
                    warn!(action = %rule.action, "Organize rule failed: {}", e);
                    results.push(json!({
                        "rule": rule,
                        "status": "error",
                        "error": e.to_string(),
                    }));
                }
            }
        }
        Ok(json!({ "results": results }))
    }

    async fn apply_rule(&self, drive: &str, rule: &OrganizeRule) -> Result<Vec<Value>> {
        if rule.search_query.trim().is_empty() {
            return Err(GatewayError::Validation(
                "search_query is required for each rule".to_string(),
            ));
        }
        let folder = match rule.action.as_str() {
            "move" => Some(
                rule.target_folder
                    .as_deref()
                    .filter(|f| !f.trim().is_empty())
                    .ok_or_else(|| {
                        GatewayError::Validation("move rules need a target_folder".to_string())
                    })?,
            ),
            "delete" => None,
            other => {
                return Err(GatewayError::Validation(format!(
                    "unknown rule action '{}'",
                    other
                )))
            }
        };

        let found = self.search_in(drive, &rule.search_query, 200).await?;
        // Only files are acted upon; folders that match the query are left alone.
        let files: Vec<Value> = found
            .get("value")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter(|f| f.get("file").is_some())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let target = match folder {
            Some(folder) => Some((folder, self.ensure_folder(drive, folder).await?)),
            None => None,
        };

        let mut entries = Vec::new();
        for file in &files {
            let (Some(id), name) = (item_id(file), file.get("name").and_then(|n| n.as_str()))
            else {
                continue;
            };
            let name = name.unwrap_or(&id).to_string();
            let outcome = match &target {
                Some((folder, parent_id)) => self
                    .move_item(drive, &id, parent_id)
                    .await
                    .map(|_| json!({"file": name, "action": "moved", "target": folder, "status": "success"})),
                None => self
                    .delete_item(drive, &id)
                    .await
                    .map(|_| json!({"file": name, "action": "deleted", "status": "success"})),
            };
            entries.push(outcome.unwrap_or_else(|e| {
                json!({"file": name, "action": rule.action, "status": "error", "error": e.to_string()})
            }));
        }
        Ok(entries)
    }

    // --- content transfer ---

    pub async fn upload_file(&self, target_path: &str, data: Vec<u8>, user_id: Option<&str>) -> Result<Value> {
        if paths::split_parent(target_path).is_none() {
            return Err(GatewayError::Validation(
                "target_path must name a file".to_string(),
            ));
        }
        let drive = self.drive_base(user_id).await?;
        let item = paths::item_path(&drive, target_path);

        if data.len() <= self.simple_upload_limit {
            return self
                .executor
                .execute_json(
                    RemoteRequest::put(format!("{}/content", item))
                        .query(CONFLICT_BEHAVIOR, "rename")
                        .bytes(data, "application/octet-stream"),
                )
                .await;
        }
        self.upload_in_session(&item, data).await
    }

    async fn upload_in_session(&self, item: &str, data: Vec<u8>) -> Result<Value> {
        let session = self
            .executor
            .execute_json(
                RemoteRequest::post(format!("{}/createUploadSession", item))
                    .json(json!({ "item": { CONFLICT_BEHAVIOR: "rename" } })),
            )
            .await?;
        let upload_url = session
            .get("uploadUrl")
            .and_then(|u| u.as_str())
            .ok_or_else(|| GatewayError::Remote {
                status: 502,
                message: "upload session without uploadUrl".to_string(),
            })?
            .to_string();

        let total = data.len();
        let mut last = Value::Null;
        for (index, chunk) in data.chunks(self.upload_chunk_size).enumerate() {
            let start = index * self.upload_chunk_size;
            let end = start + chunk.len() - 1;
            debug!(start, end, total, "Uploading chunk");
            let resp = self
                .executor
                .execute(
                    RemoteRequest::absolute(Method::PUT, upload_url.as_str())
                        .header("Content-Range", format!("bytes {}-{}/{}", start, end, total))
                        .bytes(chunk.to_vec(), "application/octet-stream"),
                )
                .await?;
            last = resp.json()?;
        }
        Ok(last)
    }

    pub async fn download_file(&self, file_id: &str, user_id: Option<&str>) -> Result<Value> {
        types::require("file_id", file_id)?;
        let drive = self.drive_base(user_id).await?;
        let meta = self
            .executor
            .execute_json(
                RemoteRequest::get(format!("{}/items/{}", drive, file_id))
                    .query("$select", "id,name,size,file,@microsoft.graph.downloadUrl"),
            )
            .await?;
        if meta.get("file").is_none() {
            return Err(GatewayError::Validation(format!(
                "item {} is not a file",
                file_id
            )));
        }
        let url = meta
            .get("@microsoft.graph.downloadUrl")
            .and_then(|u| u.as_str())
            .ok_or_else(|| GatewayError::Remote {
                status: 502,
                message: "Graph returned no download URL".to_string(),
            })?;
        Ok(json!({
            "id": meta.get("id"),
            "name": meta.get("name"),
            "size": meta.get("size"),
            "downloadUrl": url,
        }))
    }

    /// Fetch the content behind a download URL.
    pub async fn fetch_content(&self, download_url: &str) -> Result<Vec<u8>> {
        self.executor.fetch_absolute(download_url).await
    }

    // --- bulk ---

    pub async fn bulk_move(&self, file_ids: &[String], target_path: &str, user_id: Option<&str>) -> Result<BulkResult> {
        let drive = self.drive_base(user_id).await?;
        let parent_id = self.resolve_folder_id(&drive, target_path).await?;
        let (drive, parent_id) = (&drive, &parent_id);
        Ok(bulk::apply_each(file_ids, |id| async move { self.move_item(drive, &id, parent_id).await }).await)
    }

    pub async fn bulk_copy(&self, file_ids: &[String], target_path: &str, user_id: Option<&str>) -> Result<BulkResult> {
        let drive = self.drive_base(user_id).await?;
        let parent_id = self.resolve_folder_id(&drive, target_path).await?;
        let (drive, parent_id) = (&drive, &parent_id);
        Ok(bulk::apply_each(file_ids, |id| async move { self.copy_item(drive, &id, parent_id, None).await }).await)
    }

    pub async fn bulk_delete(&self, file_ids: &[String], user_id: Option<&str>) -> Result<BulkResult> {
        let drive = self.drive_base(user_id).await?;
        let drive = &drive;
        Ok(bulk::apply_each(file_ids, |id| async move { self.delete_item(drive, &id).await }).await)
    }

    // --- server-side operations on items of any size ---

    /// Metadata-only move; item size does not matter.
    pub async fn move_large_file(&self, drive_id: Option<&str>, item_id: &str, new_parent_id: &str) -> Result<Value> {
        types::require("item_id", item_id)?;
        types::require("new_parent_id", new_parent_id)?;
        let drive = match drive_id.filter(|d| !d.trim().is_empty()) {
            Some(d) => format!("/drives/{}", d),
            None => self.drive_base(None).await?,
        };
        let moved = self.move_item(&drive, item_id, new_parent_id).await?;
        Ok(json!({
            "operationId": format!("move-{}", item_id),
            "itemId": moved.get("id").cloned().unwrap_or_else(|| json!(item_id)),
            "name": moved.get("name"),
            "webUrl": moved.get("webUrl"),
            "status": "completed",
        }))
    }

    pub async fn copy_large_file(
        &self,
        source_drive_id: &str,
        item_id: &str,
        target_drive_id: &str,
        target_parent_id: &str,
    ) -> Result<Value> {
        for (field, value) in [
            ("source_drive_id", source_drive_id),
            ("item_id", item_id),
            ("target_drive_id", target_drive_id),
            ("target_parent_id", target_parent_id),
        ] {
            types::require(field, value)?;
        }
        let resp = self
            .executor
            .execute(
                RemoteRequest::post(format!("/drives/{}/items/{}/copy", source_drive_id, item_id))
                    .json(json!({
                        "parentReference": { "driveId": target_drive_id, "id": target_parent_id }
                    })),
            )
            .await?;
        let monitor_url = resp.location.ok_or_else(|| GatewayError::Remote {
            status: resp.status,
            message: "copy accepted without a monitor location".to_string(),
        })?;
        Ok(json!({
            "operationId": paths::last_segment(&monitor_url),
            "monitorUrl": monitor_url,
            "status": "pending",
        }))
    }

    /// One observation of an async copy. Callers poll until `completed` or `failed`.
    pub async fn poll_copy_status(&self, monitor_url: &str) -> Result<Value> {
        types::require("monitor_url", monitor_url)?;
        url::Url::parse(monitor_url)
            .map_err(|e| GatewayError::Validation(format!("monitor_url: {}", e)))?;

        let resp = self
            .executor
            .execute(RemoteRequest::absolute(Method::GET, monitor_url))
            .await?;
        let body = if resp.is_empty() { json!({}) } else { resp.json()? };

        let remote_status = body.get("status").and_then(|s| s.as_str());
        let status = match (resp.status, remote_status) {
            (_, Some(s)) => CopyStatus::from_remote(s),
            (303, None) => CopyStatus::Completed,
            _ => CopyStatus::InProgress,
        };

        let new_item_id = body
            .get("resourceId")
            .and_then(|r| r.as_str())
            .map(str::to_string)
            .or_else(|| {
                resp.location
                    .as_deref()
                    .filter(|_| status == CopyStatus::Completed)
                    .and_then(paths::last_segment)
            });

        let mut out = json!({
            "operationId": paths::last_segment(monitor_url),
            "status": status,
        });
        if let Some(id) = new_item_id.filter(|_| status == CopyStatus::Completed) {
            out["newItemId"] = json!(id);
        }
        if let Some(pct) = body.get("percentageComplete") {
            out["percentageComplete"] = pct.clone();
        }
        if status == CopyStatus::Failed {
            if let Some(err) = body.get("error") {
                out["error"] = err.clone();
            }
        }
        Ok(out)
    }
}

/// Decode upload content from whichever argument carries it.
pub async fn upload_payload(args: &types::UploadArgs) -> Result<Vec<u8>> {
    match (&args.local_path, &args.content_base64, &args.content) {
        (Some(path), _, _) => Ok(tokio::fs::read(path).await?),
        (None, Some(b64), _) => base64::engine::general_purpose::STANDARD
            .decode(b64.trim())
            .map_err(|e| GatewayError::Validation(format!("content_base64: {}", e))),
        (None, None, Some(text)) => Ok(text.clone().into_bytes()),
        (None, None, None) => Err(GatewayError::Validation(
            "one of local_path, content_base64 or content is required".to_string(),
        )),
    }
}

fn item_id(item: &Value) -> Option<String> {
    item.get("id").and_then(|v| v.as_str()).map(str::to_string)
}

fn first_id(list: &Value) -> Option<String> {
    list.get("value")
        .and_then(|v| v.as_array())
        .and_then(|items| items.first())
        .and_then(item_id)
}
