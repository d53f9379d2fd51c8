//! Skill record types.
//!
//! A [`SkillRecord`] bundles a callable with the metadata an agent needs to
//! decide whether to use it: a description, a tag set, parameter docs and an
//! open bag of extra fields.  Records are built explicitly through
//! [`SkillRecord::builder`]; the registry stores them behind an `Arc` and
//! never copies the underlying function.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BoxError, Result, SkillError, SkillFault};
use crate::tracker::{ExecutionTracker, LastCall};

/// Namespace given to skills registered without an explicit source.
pub const DEFAULT_NAMESPACE: &str = "local";

/// The invocable part of a skill.
pub type SkillFn = Arc<dyn Fn(&SkillArgs) -> std::result::Result<Value, BoxError> + Send + Sync>;

/// Wrap a closure or function as a [`SkillFn`].
pub fn skill_fn<F>(f: F) -> SkillFn
where
    F: Fn(&SkillArgs) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
{
    Arc::new(f)
}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// Arguments passed to a skill: positional values plus named values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillArgs {
    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<Value>,
    /// Named arguments.
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

/// Error raised by [`SkillArgs`] accessors when an argument is missing or
/// has the wrong shape.
#[derive(Debug, thiserror::Error)]
pub enum ArgumentError {
    #[error("missing argument `{name}` (position {position})")]
    Missing { name: String, position: usize },

    #[error("argument `{name}` has the wrong type: {reason}")]
    WrongType { name: String, reason: String },
}

impl SkillArgs {
    /// Empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from positional values only.
    pub fn positional(args: impl IntoIterator<Item = Value>) -> Self {
        Self {
            args: args.into_iter().collect(),
            kwargs: Map::new(),
        }
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Set a named argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    /// Look up an argument by name first, then by position.
    pub fn get(&self, position: usize, name: &str) -> Option<&Value> {
        self.kwargs.get(name).or_else(|| self.args.get(position))
    }

    /// Deserialize a required argument.
    pub fn required<T: DeserializeOwned>(
        &self,
        position: usize,
        name: &str,
    ) -> std::result::Result<T, ArgumentError> {
        let value = self.get(position, name).ok_or_else(|| ArgumentError::Missing {
            name: name.to_owned(),
            position,
        })?;
        serde_json::from_value(value.clone()).map_err(|e| ArgumentError::WrongType {
            name: name.to_owned(),
            reason: e.to_string(),
        })
    }

    /// Deserialize an optional argument, falling back to `default` when absent.
    pub fn optional<T: DeserializeOwned>(
        &self,
        position: usize,
        name: &str,
        default: T,
    ) -> std::result::Result<T, ArgumentError> {
        match self.get(position, name) {
            None | Some(Value::Null) => Ok(default),
            Some(_) => self.required(position, name),
        }
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One registered capability.
#[derive(Clone)]
pub struct SkillRecord {
    key: String,
    name: String,
    namespace: String,
    description: String,
    tags: BTreeSet<String>,
    parameters: BTreeMap<String, String>,
    extra: Map<String, Value>,
    callable: SkillFn,
    tracker: ExecutionTracker,
}

impl fmt::Debug for SkillRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkillRecord")
            .field("key", &self.key)
            .field("description", &self.description)
            .field("tags", &self.tags)
            .field("parameters", &self.parameters)
            .field("extra", &self.extra)
            .finish_non_exhaustive()
    }
}

impl SkillRecord {
    /// Start building a record for `name` backed by `callable`.
    pub fn builder(name: impl Into<String>, callable: SkillFn) -> SkillRecordBuilder {
        SkillRecordBuilder {
            name: name.into(),
            namespace: None,
            description: None,
            doc: None,
            tags: BTreeSet::new(),
            parameters: BTreeMap::new(),
            extra: Map::new(),
            callable,
        }
    }

    /// Unique identifier within a registry: `namespace.name`.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Short name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source namespace the key was derived from.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Whether the record carries `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Parameter name → description.
    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    /// Extra metadata (version, author, custom fields).
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// The shared callable.
    pub fn callable(&self) -> &SkillFn {
        &self.callable
    }

    pub fn tracker(&self) -> &ExecutionTracker {
        &self.tracker
    }

    /// Full metadata bag: the core fields plus every extra field.
    pub fn metadata(&self) -> Map<String, Value> {
        let mut meta = Map::new();
        meta.insert("key".into(), Value::String(self.key.clone()));
        meta.insert("name".into(), Value::String(self.name.clone()));
        meta.insert(
            "description".into(),
            Value::String(self.description.clone()),
        );
        meta.insert(
            "tags".into(),
            Value::Array(self.tags.iter().cloned().map(Value::String).collect()),
        );
        meta.insert(
            "parameters".into(),
            Value::Object(
                self.parameters
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            ),
        );
        for (k, v) in &self.extra {
            meta.insert(k.clone(), v.clone());
        }
        meta
    }

    /// Run the skill and record the call in its tracker.
    ///
    /// A failing skill's error is recorded and returned inside
    /// [`SkillError::Invocation`] without translation.
    pub fn call(&self, args: &SkillArgs) -> Result<Value> {
        let outcome: std::result::Result<Value, SkillFault> =
            (self.callable)(args).map_err(SkillFault::from);
        self.tracker.record(LastCall::completed(args, &outcome));

        outcome.map_err(|source| {
            tracing::warn!(skill = %self.key, error = %source, "skill invocation failed");
            SkillError::Invocation {
                key: self.key.clone(),
                source,
            }
        })
    }

    /// Copy of this record under a different namespace.
    ///
    /// The callable and tracker stay shared with the original.
    pub fn with_namespace(&self, namespace: &str) -> Self {
        let mut record = self.clone();
        record.namespace = namespace.to_owned();
        record.key = format!("{namespace}.{}", record.name);
        record
    }

    /// The same record with an empty tracker of its own.
    pub(crate) fn with_fresh_tracker(mut self) -> Self {
        self.tracker = ExecutionTracker::new();
        self
    }

    pub(crate) fn set_description(&mut self, description: String) {
        self.description = description;
    }

    pub(crate) fn set_tags(&mut self, tags: BTreeSet<String>) {
        self.tags = tags;
    }

    pub(crate) fn extra_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.extra
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder returned by [`SkillRecord::builder`].
pub struct SkillRecordBuilder {
    name: String,
    namespace: Option<String>,
    description: Option<String>,
    doc: Option<String>,
    tags: BTreeSet<String>,
    parameters: BTreeMap<String, String>,
    extra: Map<String, Value>,
    callable: SkillFn,
}

impl SkillRecordBuilder {
    /// Explicit description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Documentation attached to the callable itself, used when no explicit
    /// description is given.
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Namespace the key is derived from.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Document one parameter.
    pub fn param(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), description.into());
        self
    }

    /// Attach an extra metadata field.
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Validate and produce the record.
    ///
    /// Fails with [`SkillError::InvalidSkill`] when the name is empty or
    /// contains `.`, or when neither an explicit description nor callable
    /// documentation is available.
    pub fn build(self) -> Result<SkillRecord> {
        let name = self.name.trim().to_owned();
        if name.is_empty() || name.contains('.') {
            return Err(SkillError::InvalidSkill {
                name,
                reason: "name must be non-empty and must not contain `.`".into(),
            });
        }

        let description = self
            .description
            .or(self.doc)
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| SkillError::InvalidSkill {
                name: name.clone(),
                reason: "no description supplied and the callable has no documentation".into(),
            })?;

        let namespace = self
            .namespace
            .map(|ns| ns.trim().to_owned())
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_owned());

        let tags = normalize_tags(self.tags);

        Ok(SkillRecord {
            key: format!("{namespace}.{name}"),
            name,
            namespace,
            description,
            tags,
            parameters: self.parameters,
            extra: self.extra,
            callable: self.callable,
            tracker: ExecutionTracker::new(),
        })
    }
}

/// Trim tags and drop the empty ones.
pub(crate) fn normalize_tags<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_owned())
        .filter(|t| !t.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::CallStatus;
    use serde_json::json;

    fn divide() -> SkillFn {
        skill_fn(|args| {
            let a: f64 = args.required(0, "a")?;
            let b: f64 = args.required(1, "b")?;
            if b == 0.0 {
                return Err("cannot divide by zero".into());
            }
            Ok(json!(a / b))
        })
    }

    #[test]
    fn key_is_namespace_dot_name() {
        let record = SkillRecord::builder("divide", divide())
            .namespace("math")
            .description("Divide two numbers")
            .build()
            .unwrap();
        assert_eq!(record.key(), "math.divide");
        assert_eq!(record.name(), "divide");

        let local = SkillRecord::builder("divide", divide())
            .description("Divide two numbers")
            .build()
            .unwrap();
        assert_eq!(local.key(), "local.divide");
    }

    #[test]
    fn description_falls_back_to_doc() {
        let record = SkillRecord::builder("divide", divide())
            .doc("Divides a by b.")
            .build()
            .unwrap();
        assert_eq!(record.description(), "Divides a by b.");

        let explicit = SkillRecord::builder("divide", divide())
            .doc("Divides a by b.")
            .description("Division")
            .build()
            .unwrap();
        assert_eq!(explicit.description(), "Division");
    }

    #[test]
    fn missing_description_is_invalid() {
        let err = SkillRecord::builder("divide", divide()).build().unwrap_err();
        assert!(matches!(err, SkillError::InvalidSkill { .. }));

        let blank = SkillRecord::builder("divide", divide())
            .description("   ")
            .build()
            .unwrap_err();
        assert!(matches!(blank, SkillError::InvalidSkill { .. }));
    }

    #[test]
    fn dotted_name_is_invalid() {
        let err = SkillRecord::builder("math.divide", divide())
            .description("d")
            .build()
            .unwrap_err();
        assert!(matches!(err, SkillError::InvalidSkill { .. }));
    }

    #[test]
    fn tags_collapse_duplicates() {
        let record = SkillRecord::builder("divide", divide())
            .description("d")
            .tags(["math", "arith", "math"])
            .tag("arith")
            .build()
            .unwrap();
        assert_eq!(record.tags().len(), 2);
        assert!(record.has_tag("math"));
    }

    #[test]
    fn metadata_merges_core_and_extra() {
        let record = SkillRecord::builder("detect_objects", divide())
            .description("Detect objects in an image")
            .tags(["vision", "ml"])
            .param("image_path", "Path to the image")
            .meta("version", "2.0")
            .meta("requires_gpu", true)
            .meta("supported_formats", json!(["jpg", "png"]))
            .build()
            .unwrap();

        let meta = record.metadata();
        assert_eq!(meta["name"], json!("detect_objects"));
        assert_eq!(meta["description"], json!("Detect objects in an image"));
        assert_eq!(meta["tags"], json!(["ml", "vision"]));
        assert_eq!(meta["parameters"]["image_path"], json!("Path to the image"));
        assert_eq!(meta["version"], json!("2.0"));
        assert_eq!(meta["requires_gpu"], json!(true));
        assert_eq!(meta["supported_formats"], json!(["jpg", "png"]));
    }

    #[test]
    fn call_records_success_and_failure() {
        let record = SkillRecord::builder("divide", divide())
            .description("Divide")
            .build()
            .unwrap();

        let value = record
            .call(&SkillArgs::new().arg(10.0).arg(4.0))
            .unwrap();
        assert_eq!(value, json!(2.5));
        assert_eq!(record.tracker().status(), CallStatus::CalledOk);

        let err = record.call(&SkillArgs::new().arg(1.0).arg(0.0)).unwrap_err();
        assert_eq!(err.skill_fault().unwrap().to_string(), "cannot divide by zero");
        let last = record.tracker().get_last_call();
        assert_eq!(last.status(), CallStatus::CalledError);
        assert!(last.result.is_none());
        assert_eq!(last.args, vec![json!(1.0), json!(0.0)]);
    }

    #[test]
    fn named_arguments_take_precedence() {
        let args = SkillArgs::new().arg(1).kwarg("a", 5);
        let a: i64 = args.required(0, "a").unwrap();
        assert_eq!(a, 5);

        let missing = args.required::<i64>(3, "z").unwrap_err();
        assert!(matches!(missing, ArgumentError::Missing { .. }));

        let limit: usize = args.optional(4, "limit", 50).unwrap();
        assert_eq!(limit, 50);
    }

    #[test]
    fn with_namespace_shares_tracker() {
        let record = SkillRecord::builder("divide", divide())
            .description("Divide")
            .build()
            .unwrap();
        let moved = record.with_namespace("calc");
        assert_eq!(moved.key(), "calc.divide");

        moved.call(&SkillArgs::new().arg(4.0).arg(2.0)).unwrap();
        assert_eq!(record.tracker().get_last_result(), Some(json!(2.0)));

        let fresh = moved.with_fresh_tracker();
        assert_eq!(fresh.tracker().status(), CallStatus::NeverCalled);
        assert_eq!(record.tracker().status(), CallStatus::CalledOk);
    }

    #[test]
    fn blank_tags_are_dropped() {
        let record = SkillRecord::builder("divide", divide())
            .description("d")
            .tags(["", " math ", "  "])
            .build()
            .unwrap();
        assert_eq!(record.tags().iter().collect::<Vec<_>>(), vec!["math"]);
    }
}
