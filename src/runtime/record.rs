use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// What the workflow engine needs from a persisted entity.
///
/// Action nodes are stored as `Value::Bool`, decision nodes as
/// `Value::String` or `Value::Null`, both under the node id.
pub trait Record {
    fn get_field(&self, name: &str) -> Option<Value>;
    fn set_field(&mut self, name: &str, value: Value) -> Result<()>;
    /// All fields, used to evaluate automatic expressions.
    fn fields(&self) -> HashMap<String, Value>;

    fn started(&self) -> Option<DateTime<Utc>>;
    fn completed(&self) -> Option<DateTime<Utc>>;
    fn cancelled(&self) -> Option<DateTime<Utc>>;
    fn set_started(&mut self, at: DateTime<Utc>);
    fn set_completed(&mut self, at: DateTime<Utc>);
    fn set_cancelled(&mut self, at: DateTime<Utc>);
}

/// Plain in-memory record, also the on-disk format of the bundled stores.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    pub id: Uuid,
    pub workflow: String,
    #[serde(default)]
    pub fields: HashMap<String, Value>,
    pub started: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled: Option<DateTime<Utc>>,
}

impl MemoryRecord {
    pub fn new(workflow: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow: workflow.to_string(),
            fields: HashMap::new(),
            started: Some(Utc::now()),
            completed: None,
            cancelled: None,
        }
    }

    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Neither completed nor cancelled.
    pub fn is_open(&self) -> bool {
        self.completed.is_none() && self.cancelled.is_none()
    }
}

impl Record for MemoryRecord {
    fn get_field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<()> {
        self.fields.insert(name.to_string(), value);
        Ok(())
    }

    fn fields(&self) -> HashMap<String, Value> {
        self.fields.clone()
    }

    fn started(&self) -> Option<DateTime<Utc>> {
        self.started
    }

    fn completed(&self) -> Option<DateTime<Utc>> {
        self.completed
    }

    fn cancelled(&self) -> Option<DateTime<Utc>> {
        self.cancelled
    }

    fn set_started(&mut self, at: DateTime<Utc>) {
        self.started = Some(at);
    }

    fn set_completed(&mut self, at: DateTime<Utc>) {
        self.completed = Some(at);
    }

    fn set_cancelled(&mut self, at: DateTime<Utc>) {
        self.cancelled = Some(at);
    }
}

pub(crate) fn flag(record: &dyn Record, field: &str) -> bool {
    record
        .get_field(field)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

pub(crate) fn choice(record: &dyn Record, field: &str) -> Option<String> {
    record
        .get_field(field)
        .and_then(|v| v.as_str().map(str::to_string))
}
