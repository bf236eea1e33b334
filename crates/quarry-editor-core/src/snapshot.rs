//! Document snapshots: the unit the history engine records and restores.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smol_str::SmolStr;

/// One block as its tool saved it: stable id, tool tag, opaque data and the
/// optional tunes mapping. `time` is the tool's save timestamp (milliseconds);
/// it travels with the record but never participates in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedBlock {
    pub id: SmolStr,
    pub tool: SmolStr,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tunes: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
}

impl SavedBlock {
    pub fn new(id: impl Into<SmolStr>, tool: impl Into<SmolStr>, data: Value) -> Self {
        Self {
            id: id.into(),
            tool: tool.into(),
            data,
            tunes: None,
            time: None,
        }
    }

    pub fn with_tunes(mut self, tunes: Value) -> Self {
        self.tunes = Some(tunes);
        self
    }
}

impl PartialEq for SavedBlock {
    /// All fields except `time`. Absent tunes compare equal to an empty
    /// mapping, matching the serialized form.
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.tool == other.tool
            && self.data == other.data
            && tunes_equivalent(&self.tunes, &other.tunes)
    }
}

impl Eq for SavedBlock {}

fn tunes_equivalent(a: &Option<Value>, b: &Option<Value>) -> bool {
    fn is_empty(v: &Option<Value>) -> bool {
        match v {
            None => true,
            Some(Value::Object(map)) => map.is_empty(),
            Some(Value::Null) => true,
            Some(_) => false,
        }
    }
    match (a, b) {
        (Some(x), Some(y)) if x == y => true,
        _ => is_empty(a) && is_empty(b),
    }
}

/// Ordered block records forming one state of the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub blocks: Vec<SavedBlock>,
}

impl DocumentSnapshot {
    pub fn new(blocks: Vec<SavedBlock>) -> Self {
        Self { blocks }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn block_by_id(&self, id: &str) -> Option<&SavedBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == id)
    }
}
