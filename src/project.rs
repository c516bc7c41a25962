use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

// Wire model shared with the .NET helper. Every field is optional: a missing
// field means the helper could not read that record member, and the batch
// carries on with an empty value for it.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectRecords {
    #[serde(default)]
    pub models: Vec<ModelRecord>,
    #[serde(default)]
    pub accessories: Vec<ModelRecord>,
    #[serde(default)]
    pub media: Option<MediaRecords>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaRecords {
    #[serde(default)]
    pub audio: Option<String>,
    #[serde(default)]
    pub video: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl ProjectRecords {
    pub fn summary(&self, file_name: &str) -> String {
        format!(
            "{file_name}: Model x{}, Accessory x{}",
            self.models.len(),
            self.accessories.len()
        )
    }
}

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("runtime unavailable: {0}")]
    Environment(String),
    #[error("project read failed: {0}")]
    Parse(String),
}

pub trait ProjectIo {
    fn extract(&self, path: &Path) -> Result<ProjectRecords, ProjectError>;
    fn apply(&self, path: &Path, records: &ProjectRecords) -> Result<(), ProjectError>;
}
