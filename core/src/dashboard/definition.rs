// Dashboard definitions
//
// The block list of one dashboard as stored by the editor. Layout fields the
// editor keeps (position, size) are ignored here.

use crate::source::DataSourceDescriptor;
use crate::{Result, VigilError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// One tile on a dashboard
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDescriptor {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Renderer kind (chart, table, stat...); opaque to the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<DataSourceDescriptor>,
}

impl BlockDescriptor {
    pub fn new(id: impl Into<String>, data_source: Option<DataSourceDescriptor>) -> Self {
        Self {
            id: id.into(),
            title: None,
            kind: None,
            data_source,
        }
    }

    /// Title if set, otherwise the id
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardDefinition {
    pub name: String,
    #[serde(default)]
    pub blocks: Vec<BlockDescriptor>,
}

impl DashboardDefinition {
    pub fn from_json(json: &str) -> Result<Self> {
        let def: Self = serde_json::from_str(json)?;
        def.validate()?;
        Ok(def)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let def = Self::from_json(&std::fs::read_to_string(path)?)?;
        info!(
            target: "dashboard",
            path = %path.display(),
            name = %def.name,
            blocks = def.blocks.len(),
            "Loaded dashboard definition"
        );
        Ok(def)
    }

    /// Block ids must be non-empty and unique.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for block in &self.blocks {
            if block.id.trim().is_empty() {
                return Err(VigilError::DashboardError(format!(
                    "dashboard '{}' has a block without an id",
                    self.name
                )));
            }
            if !seen.insert(block.id.as_str()) {
                return Err(VigilError::DashboardError(format!(
                    "dashboard '{}' has duplicate block id '{}'",
                    self.name, block.id
                )));
            }
        }
        Ok(())
    }

    pub fn block(&self, id: &str) -> Option<&BlockDescriptor> {
        self.blocks.iter().find(|b| b.id == id)
    }
}
