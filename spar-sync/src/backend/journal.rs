//! CDN stand-in that records invalidation batches in a JSON-lines journal at
//! `<root>/<distribution>.invalidations.jsonl`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use spar_core::ObjectKey;

use super::{CdnInvalidator, InvalidationId};
use crate::error::{io_err, BackendError};

/// One submitted batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: InvalidationId,
    pub distribution: String,
    pub created_at: DateTime<Utc>,
    pub paths: Vec<ObjectKey>,
}

#[derive(Debug)]
pub struct JournalCdn {
    distribution: String,
    path: PathBuf,
    /// Serialises appends from this process.
    lock: Mutex<()>,
}

impl JournalCdn {
    pub fn new(root: &Path, distribution: impl Into<String>) -> Self {
        let distribution = distribution.into();
        Self {
            path: root.join(format!("{distribution}.invalidations.jsonl")),
            distribution,
            lock: Mutex::new(()),
        }
    }

    /// Every recorded batch, oldest first. A missing journal is empty.
    pub async fn entries(&self) -> Result<Vec<JournalEntry>, BackendError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&self.path, e)),
        };
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(BackendError::from))
            .collect()
    }
}

#[async_trait]
impl CdnInvalidator for JournalCdn {
    async fn invalidate(&self, paths: &[ObjectKey]) -> Result<InvalidationId, BackendError> {
        let _guard = self.lock.lock().await;

        let sequence = self.entries().await?.len() + 1;
        let created_at = Utc::now();
        let entry = JournalEntry {
            id: InvalidationId(format!(
                "I{}-{sequence:04}",
                created_at.format("%Y%m%d%H%M%S")
            )),
            distribution: self.distribution.clone(),
            created_at,
            paths: paths.to_vec(),
        };

        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(parent, e))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| io_err(&self.path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| io_err(&self.path, e))?;
        file.flush().await.map_err(|e| io_err(&self.path, e))?;

        tracing::info!(
            distribution = %self.distribution,
            id = %entry.id,
            paths = paths.len(),
            "invalidation recorded"
        );
        Ok(entry.id)
    }
}
