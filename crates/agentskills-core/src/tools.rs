//! Tool definitions for an external agent.
//!
//! Each registered skill is described as a tool: a machine-readable name
//! derived from its key, its description, and a JSON Schema object built
//! from its parameter docs.  A `required` array of parameter names in the
//! skill's extra metadata is carried into the schema.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::record::SkillRecord;
use crate::registry::SkillRegistry;

/// A skill as the agent sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (e.g. `stats_median` for `stats.median`).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema describing the tool's input parameters.
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn from_record(record: &SkillRecord) -> Self {
        let properties: Map<String, Value> = record
            .parameters()
            .iter()
            .map(|(name, doc)| (name.clone(), json!({ "description": doc })))
            .collect();

        let mut schema = json!({
            "type": "object",
            "properties": properties,
        });
        if let Some(required) = record.extra().get("required").filter(|v| v.is_array()) {
            schema["required"] = required.clone();
        }

        Self {
            name: tool_name(record.key()),
            description: record.description().to_owned(),
            parameters: schema,
        }
    }
}

/// Convert a skill key into a tool name: ASCII alphanumerics (case kept),
/// `_` and `-`, with runs of anything else collapsed to one `_`.
pub fn tool_name(key: &str) -> String {
    let mut name = String::with_capacity(key.len());
    let mut prev_underscore = false;
    for c in key.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '-' {
            c
        } else {
            '_'
        };
        if c == '_' {
            if !prev_underscore {
                name.push('_');
            }
            prev_underscore = true;
        } else {
            name.push(c);
            prev_underscore = false;
        }
    }
    name.trim_matches('_').to_owned()
}

impl SkillRegistry {
    /// Tool definitions for every registered skill, in registration order.
    ///
    /// Distinct keys that sanitise to the same name get a numeric suffix
    /// (`a_b`, `a_b_2`, ...).
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut taken = HashSet::new();
        self.records()
            .iter()
            .map(|r| {
                let mut tool = ToolDefinition::from_record(r);
                if !taken.insert(tool.name.clone()) {
                    let base = tool.name.clone();
                    let mut n = 2;
                    while !taken.insert(format!("{base}_{n}")) {
                        n += 1;
                    }
                    tool.name = format!("{base}_{n}");
                    tracing::debug!(skill = %r.key(), tool = %tool.name, "tool name collision");
                }
                tool
            })
            .collect()
    }
}
