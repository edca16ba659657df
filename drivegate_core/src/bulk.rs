use serde::Serialize;
use serde_json::{json, Value};
use std::future::Future;
use tracing::warn;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemOutcome {
    pub id: String,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-item outcomes, in input order, one per requested id.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkResult {
    pub results: Vec<ItemOutcome>,
}

impl BulkResult {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == ItemStatus::Success)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    pub fn to_value(&self) -> Value {
        json!({
            "results": self.results,
            "total": self.len(),
            "succeeded": self.succeeded(),
            "failed": self.failed(),
        })
    }
}

/// Run `op` for each id in order. A failing item is recorded and the batch continues.
pub async fn apply_each<F, Fut>(ids: &[String], mut op: F) -> BulkResult
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Value>>,
{
    let mut results = Vec::with_capacity(ids.len());
    for id in ids {
        let outcome = match op(id.clone()).await {
            Ok(data) => ItemOutcome {
                id: id.clone(),
                status: ItemStatus::Success,
                data: Some(data),
                error: None,
            },
            Err(e) => {
                warn!(item = %id, "Bulk item failed: {}", e);
                ItemOutcome {
                    id: id.clone(),
                    status: ItemStatus::Error,
                    data: None,
                    error: Some(e.to_string()),
                }
            }
        };
        results.push(outcome);
    }
    BulkResult { results }
}
