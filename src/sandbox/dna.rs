//! Run metadata written to the sandbox as `dna.json`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Node attributes and run list handed to the convergence run.
///
/// Attribute overrides are flattened to the top level of the document so the
/// file can be passed to `chef-solo --json-attributes` unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Node name, when the instance pins one.
    #[serde(rename = "name", default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,

    /// Ordered run list (e.g. `recipe[web::default]`, `role[base]`).
    #[serde(default)]
    pub run_list: Vec<String>,

    /// Attribute overrides.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl RunMetadata {
    /// Creates metadata with the given run list and no attributes.
    pub fn new(run_list: Vec<String>) -> Self {
        Self {
            node_name: None,
            run_list,
            attributes: Map::new(),
        }
    }

    /// Sets the node name.
    pub fn with_node_name(mut self, name: impl Into<String>) -> Self {
        self.node_name = Some(name.into());
        self
    }

    /// Adds a single top-level attribute override.
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Returns the JSON document written to `dna.json`.
    ///
    /// `name` and `run_list` always win over attributes of the same key, so
    /// the document never carries duplicate top-level keys.
    pub fn document(&self) -> Value {
        let mut document = self.attributes.clone();
        if let Some(name) = &self.node_name {
            document.insert("name".to_string(), Value::String(name.clone()));
        }
        document.insert(
            "run_list".to_string(),
            Value::Array(self.run_list.iter().cloned().map(Value::String).collect()),
        );
        Value::Object(document)
    }

    /// Writes the metadata as pretty JSON to `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.document())
            .map_err(|e| Error::Config(format!("failed to serialize run metadata: {}", e)))?;
        std::fs::write(path, json)?;
        tracing::debug!(path = ?path, run_list = ?self.run_list, "wrote run metadata");
        Ok(())
    }
}
