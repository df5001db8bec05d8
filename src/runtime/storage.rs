use crate::runtime::record::MemoryRecord;
use anyhow::{Context as AnyhowContext, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

// --- Interfaces ---

/// Where workflow records live between evaluations.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn load(&self, id: Uuid) -> Result<Option<MemoryRecord>>;
    async fn save(&self, record: &MemoryRecord) -> Result<()>;
    /// Records of the given workflow type that are neither completed nor
    /// cancelled. Stores may skip entries they cannot read.
    async fn list_open(&self, workflow: &str) -> Result<Vec<MemoryRecord>>;
}

// --- In-Memory Implementation ---

#[derive(Default)]
pub struct InMemoryRecordStore {
    records: DashMap<Uuid, MemoryRecord>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn load(&self, id: Uuid) -> Result<Option<MemoryRecord>> {
        Ok(self.records.get(&id).map(|r| r.value().clone()))
    }

    async fn save(&self, record: &MemoryRecord) -> Result<()> {
        self.records.insert(record.id, record.clone());
        Ok(())
    }

    async fn list_open(&self, workflow: &str) -> Result<Vec<MemoryRecord>> {
        let mut open: Vec<MemoryRecord> = self
            .records
            .iter()
            .filter(|r| r.workflow == workflow && r.is_open())
            .map(|r| r.value().clone())
            .collect();
        open.sort_by_key(|r| r.started);
        Ok(open)
    }
}

// --- JSON Directory Implementation ---

/// One pretty-printed `<uuid>.json` file per record.
pub struct JsonDirRecordStore {
    dir: PathBuf,
}

impl JsonDirRecordStore {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create record directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

#[async_trait]
impl RecordStore for JsonDirRecordStore {
    async fn load(&self, id: Uuid) -> Result<Option<MemoryRecord>> {
        let path = self.path_for(id);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let record = serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse record {}", path.display()))?;
                Ok(Some(record))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read record {}", path.display())),
        }
    }

    async fn save(&self, record: &MemoryRecord) -> Result<()> {
        let path = self.path_for(record.id);
        let content = serde_json::to_string_pretty(record)?;
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write record {}", path.display()))
    }

    async fn list_open(&self, workflow: &str) -> Result<Vec<MemoryRecord>> {
        let mut open = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("Failed to read record directory {}", self.dir.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable record");
                    continue;
                }
            };
            let record: MemoryRecord = match serde_json::from_str(&content) {
                Ok(record) => record,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unparseable record");
                    continue;
                }
            };
            if record.workflow == workflow && record.is_open() {
                open.push(record);
            }
        }
        open.sort_by_key(|r| r.started);
        Ok(open)
    }
}
