use crate::dsl::Diagram;
use crate::error::WorkflowError;
use crate::runtime::evaluator::Workflow;
use crate::runtime::record::MemoryRecord;
use crate::runtime::storage::{InMemoryRecordStore, RecordStore};
use anyhow::{Result, anyhow};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Registry of workflow types plus the store holding their records.
///
/// Diagrams are compiled once, when they are registered; evaluation only
/// ever reads the shared graph.
pub struct Engine {
    workflows: DashMap<String, Arc<Workflow>>,
    store: Arc<dyn RecordStore>,
}

impl Engine {
    pub fn new() -> Self {
        Self::new_with_store(Arc::new(InMemoryRecordStore::new()))
    }

    pub fn new_with_store(store: Arc<dyn RecordStore>) -> Self {
        Self {
            workflows: DashMap::new(),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Registers an already compiled workflow, replacing any previous
    /// workflow with the same id.
    pub fn register(&self, workflow: Workflow) -> Arc<Workflow> {
        let workflow = Arc::new(workflow);
        if self
            .workflows
            .insert(workflow.id().to_string(), workflow.clone())
            .is_some()
        {
            warn!(workflow = %workflow.id(), "Replaced registered workflow");
        }
        workflow
    }

    pub fn register_diagram(&self, diagram: &Diagram) -> Result<Arc<Workflow>, WorkflowError> {
        let workflow = Workflow::from_diagram(diagram)?;
        Ok(self.register(workflow))
    }

    pub fn workflow(&self, id: &str) -> Result<Arc<Workflow>, WorkflowError> {
        self.workflows
            .get(id)
            .map(|w| w.value().clone())
            .ok_or_else(|| WorkflowError::UnknownWorkflow(id.to_string()))
    }

    pub fn workflow_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.workflows.iter().map(|w| w.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Creates, evaluates and stores a new record for the given workflow.
    pub async fn start(&self, workflow_id: &str, fields: HashMap<String, Value>) -> Result<Uuid> {
        let workflow = self.workflow(workflow_id)?;
        let mut record = MemoryRecord::new(workflow_id);
        record.fields.extend(fields);
        workflow.save(&mut record)?;
        self.store.save(&record).await?;
        info!(workflow = %workflow_id, record = %record.id, "Workflow started");
        Ok(record.id)
    }

    pub async fn load(&self, id: Uuid) -> Result<MemoryRecord> {
        self.store
            .load(id)
            .await?
            .ok_or_else(|| anyhow!("Record not found: {}", id))
    }

    /// Runs the save cycle on a record and writes it to the store.
    pub async fn save(&self, record: &mut MemoryRecord) -> Result<()> {
        let workflow = self.workflow(&record.workflow)?;
        workflow.save(record)?;
        self.store.save(record).await
    }

    /// Applies user input to a stored record, then saves it.
    pub async fn update(&self, id: Uuid, fields: HashMap<String, Value>) -> Result<MemoryRecord> {
        let mut record = self.load(id).await?;
        record.fields.extend(fields);
        self.save(&mut record).await?;
        Ok(record)
    }

    pub async fn cancel(&self, id: Uuid) -> Result<MemoryRecord> {
        let mut record = self.load(id).await?;
        let workflow = self.workflow(&record.workflow)?;
        workflow.cancel(&mut record)?;
        self.store.save(&record).await?;
        Ok(record)
    }

    /// Saves every open record of every registered workflow once, so that
    /// automatic actions and decisions depending on outside state get a
    /// chance to run. Failing records and workflows are logged and skipped.
    /// Returns the number of records saved.
    pub async fn beat(&self) -> Result<usize> {
        let mut saved = 0;
        for workflow_id in self.workflow_ids() {
            let workflow = self.workflow(&workflow_id)?;
            let open = match self.store.list_open(&workflow_id).await {
                Ok(open) => open,
                Err(e) => {
                    error!(workflow = %workflow_id, error = %e, "Listing open records failed");
                    continue;
                }
            };
            for mut record in open {
                info!(workflow = %workflow_id, record = %record.id, "Running workflow");
                if let Err(e) = workflow.save(&mut record) {
                    error!(workflow = %workflow_id, record = %record.id, error = %e, "Workflow update failed");
                    continue;
                }
                if let Err(e) = self.store.save(&record).await {
                    error!(workflow = %workflow_id, record = %record.id, error = %e, "Storing record failed");
                    continue;
                }
                saved += 1;
            }
        }
        Ok(saved)
    }

    /// Runs [`Engine::beat`] on a fixed interval. A failed beat is logged and
    /// the next one runs as scheduled. Stops after `max_beats` beats if
    /// given, otherwise runs until the task is dropped.
    pub async fn run_beat(&self, every: Duration, max_beats: Option<usize>) -> Result<()> {
        let mut ticker = tokio::time::interval(every);
        let mut beats = 0;
        loop {
            ticker.tick().await;
            match self.beat().await {
                Ok(saved) => info!(saved, "Workflow beat finished"),
                Err(e) => error!(error = %e, "Workflow beat failed"),
            }
            beats += 1;
            if max_beats.is_some_and(|max| beats >= max) {
                return Ok(());
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
