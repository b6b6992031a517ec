//! Worklist store: pending rows in, one status write per row out
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};

/// One pending content item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorklistRecord {
    /// Row identifier within the tab
    pub row: usize,
    pub title: String,
    /// Content page URL
    pub link: String,
    /// Archive item identifier
    pub identifier: String,
}

/// Terminal status written back for a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowStatus {
    #[serde(rename = "DONE")]
    Done,
    #[serde(rename = "FAILED")]
    Failed,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowStatus::Done => "DONE",
            RowStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for RowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tabular store holding the worklist
#[async_trait]
pub trait WorklistStore: Send + Sync {
    /// Rows without a status, in store order
    async fn read_pending_rows(&self, tab: &str) -> Result<Vec<WorklistRecord>>;

    /// Highest sequence number assigned so far (0 when none)
    async fn get_max_assigned_number(&self, tab: &str) -> Result<u32>;

    /// Record a row's outcome; `number` and `message` may be blank
    async fn update_row(
        &self,
        tab: &str,
        row: usize,
        status: RowStatus,
        number: Option<u32>,
        message: &str,
    ) -> Result<()>;
}

/// A row as stored in the JSON worklist file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRow {
    pub row: usize,
    #[serde(alias = "Title")]
    pub title: String,
    #[serde(alias = "Link")]
    pub link: String,
    #[serde(alias = "Identifier")]
    pub identifier: String,
    #[serde(default)]
    pub status: Option<RowStatus>,
    #[serde(default)]
    pub number: Option<u32>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

type Tabs = BTreeMap<String, Vec<StoredRow>>;

/// Worklist kept in a JSON file mapping tab names to rows
pub struct JsonWorklistStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file
    lock: Mutex<()>,
}

impl JsonWorklistStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Tabs> {
        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| PipelineError::Worklist(format!("Cannot read {}: {}", self.path.display(), e)))?;
        let tabs: Tabs = serde_json::from_str(&content)?;
        Ok(tabs)
    }

    async fn save(&self, tabs: &Tabs) -> Result<()> {
        let json = serde_json::to_string_pretty(tabs)?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json).await?;
        fs::rename(&staging, &self.path).await?;
        Ok(())
    }

    fn tab<'a>(tabs: &'a Tabs, tab: &str) -> Result<&'a Vec<StoredRow>> {
        tabs.get(tab)
            .ok_or_else(|| PipelineError::Worklist(format!("Unknown tab: {}", tab)))
    }
}

#[async_trait]
impl WorklistStore for JsonWorklistStore {
    async fn read_pending_rows(&self, tab: &str) -> Result<Vec<WorklistRecord>> {
        let tabs = self.load().await?;
        let pending: Vec<WorklistRecord> = Self::tab(&tabs, tab)?
            .iter()
            .filter(|row| row.status.is_none())
            .map(|row| WorklistRecord {
                row: row.row,
                title: row.title.clone(),
                link: row.link.clone(),
                identifier: row.identifier.clone(),
            })
            .collect();

        info!("📋 {} pending rows in tab {}", pending.len(), tab);
        Ok(pending)
    }

    async fn get_max_assigned_number(&self, tab: &str) -> Result<u32> {
        let tabs = self.load().await?;
        Ok(Self::tab(&tabs, tab)?
            .iter()
            .filter_map(|row| row.number)
            .max()
            .unwrap_or(0))
    }

    async fn update_row(
        &self,
        tab: &str,
        row: usize,
        status: RowStatus,
        number: Option<u32>,
        message: &str,
    ) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut tabs = self.load().await?;

        let stored = tabs
            .get_mut(tab)
            .ok_or_else(|| PipelineError::Worklist(format!("Unknown tab: {}", tab)))?
            .iter_mut()
            .find(|stored| stored.row == row)
            .ok_or_else(|| PipelineError::Worklist(format!("Row {} not found in tab {}", row, tab)))?;

        stored.status = Some(status);
        stored.number = number;
        stored.message = message.to_string();
        stored.updated_at = Some(Utc::now());

        self.save(&tabs).await?;
        debug!("💾 Row {} in tab {} set to {}", row, tab, status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SHEET: &str = r#"{
        "AZ": [
            {"row": 2, "Title": "First", "Link": "https://a.example/1.html", "Identifier": "item-1", "status": "DONE", "number": 4},
            {"row": 3, "Title": "Second", "Link": "https://a.example/2.html", "Identifier": "item-2"},
            {"row": 4, "title": "Third", "link": "https://a.example/3.html", "identifier": "item-3", "status": "FAILED", "message": "HTTP 404"},
            {"row": 5, "title": "Fourth", "link": "https://a.example/4.html", "identifier": "item-4"}
        ],
        "OTHER": []
    }"#;

    async fn store() -> (TempDir, JsonWorklistStore) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("worklist.json");
        fs::write(&path, SHEET).await.unwrap();
        (temp_dir, JsonWorklistStore::new(path))
    }

    #[tokio::test]
    async fn test_read_pending_rows() {
        let (_dir, store) = store().await;
        let rows = store.read_pending_rows("AZ").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row, 3);
        assert_eq!(rows[0].title, "Second");
        assert_eq!(rows[1].identifier, "item-4");
    }

    #[tokio::test]
    async fn test_max_assigned_number() {
        let (_dir, store) = store().await;
        assert_eq!(store.get_max_assigned_number("AZ").await.unwrap(), 4);
        assert_eq!(store.get_max_assigned_number("OTHER").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_row_persists() {
        let (_dir, store) = store().await;
        store.update_row("AZ", 3, RowStatus::Done, Some(5), "").await.unwrap();
        store
            .update_row("AZ", 5, RowStatus::Failed, None, "No video detail HTML pages found")
            .await
            .unwrap();

        assert!(store.read_pending_rows("AZ").await.unwrap().is_empty());
        assert_eq!(store.get_max_assigned_number("AZ").await.unwrap(), 5);

        let tabs = store.load().await.unwrap();
        let failed = tabs["AZ"].iter().find(|r| r.row == 5).unwrap();
        assert_eq!(failed.status, Some(RowStatus::Failed));
        assert_eq!(failed.message, "No video detail HTML pages found");
        assert!(failed.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_unknown_tab_and_row() {
        let (_dir, store) = store().await;
        assert!(store.read_pending_rows("MISSING").await.is_err());
        assert!(store.update_row("AZ", 99, RowStatus::Done, Some(1), "").await.is_err());
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(RowStatus::Done.to_string(), "DONE");
        assert_eq!(serde_json::to_string(&RowStatus::Failed).unwrap(), "\"FAILED\"");
    }
}
