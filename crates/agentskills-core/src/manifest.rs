//! Skill manifest format.
//!
//! A manifest is a TOML file declaring the skills one source contributes.
//! Each entry names the handler that implements it; handlers are resolved
//! by the loader against a [`HandlerCatalog`](crate::HandlerCatalog).
//!
//! ```toml
//! namespace = "stats"
//!
//! [[skill]]
//! name = "median"
//! handler = "median"
//! description = "Median of a list of numbers"
//! tags = ["stats", "math"]
//!
//! [skill.parameters]
//! numbers = "List of numbers"
//!
//! [skill.metadata]
//! version = "1.0"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SkillError};

/// Parsed manifest file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Namespace for every skill in the file.  Defaults to the file stem.
    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default, rename = "skill")]
    pub skills: Vec<SkillEntry>,
}

/// One `[[skill]]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SkillEntry {
    pub name: String,

    /// Catalog handler; defaults to `name`.
    #[serde(default)]
    pub handler: Option<String>,

    /// Optional when the handler carries its own documentation.
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub parameters: BTreeMap<String, String>,

    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl SkillEntry {
    /// Handler name this entry resolves to.
    pub fn handler_name(&self) -> &str {
        self.handler.as_deref().unwrap_or(&self.name)
    }
}

impl Manifest {
    /// Parse manifest text.  `path` is used for error reporting only.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|e| SkillError::load(path, e.to_string()))
    }

    /// Namespace for a manifest read from `path`.
    pub fn namespace_for(&self, path: &Path) -> Result<String> {
        if let Some(ns) = self.namespace.as_deref().map(str::trim) {
            if ns.is_empty() || ns.contains('.') {
                return Err(SkillError::load(
                    path,
                    format!("invalid namespace `{ns}`: must be non-empty and must not contain `.`"),
                ));
            }
            return Ok(ns.to_owned());
        }

        path.file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty() && !s.contains('.'))
            .map(str::to_owned)
            .ok_or_else(|| SkillError::load(path, "cannot derive a namespace from the file name"))
    }
}
