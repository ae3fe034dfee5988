// src/store/json_file.rs

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::{merge_definition, Store, StoreFuture};
use crate::errors::{Result, SpeedwatchError};
use crate::types::{Schedule, TestResult};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    schedules: Vec<Schedule>,
    #[serde(default)]
    results: Vec<TestResult>,
}

/// Store backed by one JSON file.
///
/// Every operation reads the file, and writes replace it through a
/// temporary file and a rename, so a crash never leaves half a document.
/// A missing file reads as empty.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Document> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(Document::default()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Document::default()),
            Err(e) => Err(SpeedwatchError::Persistence(format!(
                "reading {:?}: {e}",
                self.path
            ))),
        }
    }

    async fn save(&self, doc: &Document) -> Result<()> {
        let json = serde_json::to_vec_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| SpeedwatchError::Persistence(format!("creating {parent:?}: {e}")))?;
            }
        }
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| SpeedwatchError::Persistence(format!("writing {tmp:?}: {e}")))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| SpeedwatchError::Persistence(format!("replacing {:?}: {e}", self.path)))?;

        debug!(path = ?self.path, bytes = json.len(), "store written");
        Ok(())
    }

    async fn modify<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Document) -> Result<()> + Send,
    {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        f(&mut doc)?;
        self.save(&doc).await
    }
}

impl Store for JsonFileStore {
    fn get_schedules(&self) -> StoreFuture<'_, Vec<Schedule>> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            Ok(self.load().await?.schedules)
        })
    }

    fn update_schedule(&self, schedule: Schedule) -> StoreFuture<'_, ()> {
        Box::pin(self.modify(move |doc| {
            match doc.schedules.iter_mut().find(|s| s.id == schedule.id) {
                Some(slot) => {
                    *slot = schedule;
                    Ok(())
                }
                None => Err(SpeedwatchError::Persistence(format!(
                    "schedule '{}' not found",
                    schedule.id
                ))),
            }
        }))
    }

    fn upsert_schedule(&self, schedule: Schedule) -> StoreFuture<'_, ()> {
        Box::pin(self.modify(move |doc| {
            match doc.schedules.iter().position(|s| s.id == schedule.id) {
                Some(idx) => {
                    let merged = merge_definition(Some(&doc.schedules[idx]), schedule);
                    doc.schedules[idx] = merged;
                }
                None => doc.schedules.push(schedule),
            }
            Ok(())
        }))
    }

    fn save_result(&self, result: TestResult) -> StoreFuture<'_, ()> {
        Box::pin(self.modify(move |doc| {
            doc.results.push(result);
            Ok(())
        }))
    }

    fn results(&self) -> StoreFuture<'_, Vec<TestResult>> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            Ok(self.load().await?.results)
        })
    }
}
