//! Skill registry.
//!
//! The registry is the single source of truth for which skills exist right
//! now.  It keeps an ordered `key → record` mapping (enumeration follows
//! registration order) and a `tag → keys` index that is updated under the
//! same lock on every mutation, so readers never see the two disagree.
//!
//! [`SkillRegistry`] is a cheap `Arc`-backed handle.  Clones share state:
//! any holder may register or remove skills and every other holder sees the
//! change.  Use [`SkillRegistry::snapshot`] for an independent copy.
//!
//! # Tag filtering
//!
//! Multi-tag queries use **AND** semantics: [`SkillRegistry::get_by_tag`]
//! returns only skills carrying every requested tag.  OR filtering has to be
//! asked for explicitly with [`TagMatch::Any`].
//!
//! # Example
//!
//! ```rust
//! use agentskills_core::{SkillArgs, SkillRecord, SkillRegistry, skill_fn};
//! use serde_json::json;
//!
//! let registry = SkillRegistry::new();
//! let area = skill_fn(|args| {
//!     let radius: f64 = args.required(0, "radius")?;
//!     Ok(json!(std::f64::consts::PI * radius * radius))
//! });
//! registry
//!     .register(
//!         SkillRecord::builder("circle_area", area)
//!             .description("Area of a circle")
//!             .tags(["math", "geometry"])
//!             .build()
//!             .unwrap(),
//!     )
//!     .unwrap();
//!
//! assert_eq!(registry.get_by_tag(["math", "geometry"]), vec!["circle_area"]);
//! let area = registry.invoke("circle_area", &SkillArgs::new().arg(1.0)).unwrap();
//! assert!(area.as_f64().unwrap() > 3.14);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::{Map, Value};

use crate::config::{ConflictPolicy, RegistryConfig};
use crate::error::{Result, SkillError};
use crate::mode::{ExecutionMode, Invocation};
use crate::record::{SkillArgs, SkillFn, SkillRecord, normalize_tags};
use crate::tracker::LastCall;

/// Metadata keys `update_metadata` refuses to touch.
const RESERVED_METADATA_KEYS: [&str; 3] = ["key", "name", "parameters"];

/// Combination rule for multi-tag queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TagMatch {
    /// The skill must carry every requested tag.
    #[default]
    All,
    /// The skill must carry at least one requested tag.
    Any,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Entry {
    seq: u64,
    record: Arc<SkillRecord>,
}

#[derive(Debug, Default)]
struct RegistryState {
    next_seq: u64,
    order: BTreeMap<u64, String>,
    entries: HashMap<String, Entry>,
    tag_index: HashMap<String, HashSet<String>>,
}

impl RegistryState {
    /// Insert or replace; returns whether an existing record was replaced.
    /// A replaced key keeps its enumeration position.
    fn insert(&mut self, record: Arc<SkillRecord>) -> bool {
        let key = record.key().to_owned();

        if let Some(entry) = self.entries.get_mut(&key) {
            unindex(&mut self.tag_index, &entry.record);
            index(&mut self.tag_index, &record);
            entry.record = record;
            return true;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        index(&mut self.tag_index, &record);
        self.order.insert(seq, key.clone());
        self.entries.insert(key, Entry { seq, record });
        false
    }

    fn remove(&mut self, key: &str) -> Option<Arc<SkillRecord>> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.seq);
        unindex(&mut self.tag_index, &entry.record);
        Some(entry.record)
    }

    fn ordered(&self) -> impl Iterator<Item = &Arc<SkillRecord>> + '_ {
        self.order
            .values()
            .filter_map(|key| self.entries.get(key).map(|e| &e.record))
    }

    /// Exact key first, then the first record with that name.
    fn resolve(&self, name_or_key: &str) -> Option<&Arc<SkillRecord>> {
        self.entries
            .get(name_or_key)
            .map(|e| &e.record)
            .or_else(|| self.ordered().find(|r| r.name() == name_or_key))
    }
}

fn index(tag_index: &mut HashMap<String, HashSet<String>>, record: &SkillRecord) {
    for tag in record.tags() {
        tag_index
            .entry(tag.clone())
            .or_default()
            .insert(record.key().to_owned());
    }
}

fn unindex(tag_index: &mut HashMap<String, HashSet<String>>, record: &SkillRecord) {
    for tag in record.tags() {
        if let Some(keys) = tag_index.get_mut(tag) {
            keys.remove(record.key());
            if keys.is_empty() {
                tag_index.remove(tag);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Shared, thread-safe skill registry.
#[derive(Clone)]
pub struct SkillRegistry {
    config: Arc<RegistryConfig>,
    state: Arc<RwLock<RegistryState>>,
}

impl fmt::Debug for SkillRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkillRegistry")
            .field("config", &self.config)
            .field("keys", &self.get_keys())
            .finish()
    }
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SkillRegistry {
    /// Create an empty registry with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry.
    #[must_use]
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config: Arc::new(config),
            state: Arc::new(RwLock::new(RegistryState::default())),
        }
    }

    /// Build a registry from already-validated records, in order.
    pub(crate) fn from_records<I>(config: RegistryConfig, records: I) -> Self
    where
        I: IntoIterator<Item = Arc<SkillRecord>>,
    {
        let registry = Self::with_config(config);
        {
            let mut state = registry.write();
            for record in records {
                state.insert(record);
            }
        }
        registry
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // -- Mutation ------------------------------------------------------------

    /// Register a record and return its key.
    ///
    /// An existing record with the same key is replaced (and keeps its
    /// position) unless the registry uses [`ConflictPolicy::Error`], in which
    /// case [`SkillError::DuplicateKey`] is returned.
    pub fn register(&self, record: SkillRecord) -> Result<String> {
        let mut keys = self.register_all(vec![record])?;
        Ok(keys.remove(0))
    }

    /// Wrap a plain callable and register it under the configured default
    /// namespace.
    ///
    /// Fails with [`SkillError::InvalidSkill`] when `description` is empty.
    pub fn register_fn<I, S>(
        &self,
        name: &str,
        callable: SkillFn,
        description: &str,
        tags: I,
        metadata: Map<String, Value>,
    ) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut builder = SkillRecord::builder(name, callable)
            .namespace(self.config.default_namespace.clone())
            .description(description)
            .tags(tags);
        for (key, value) in metadata {
            builder = builder.meta(key, value);
        }
        self.register(builder.build()?)
    }

    /// Register several records atomically.
    ///
    /// Under [`ConflictPolicy::Error`] every key is checked (against the
    /// registry and within the batch) before anything is inserted.
    pub fn register_all(&self, records: Vec<SkillRecord>) -> Result<Vec<String>> {
        let mut state = self.write();

        if self.config.conflict_policy == ConflictPolicy::Error {
            let mut seen = HashSet::new();
            for record in &records {
                if state.entries.contains_key(record.key()) || !seen.insert(record.key()) {
                    return Err(SkillError::DuplicateKey {
                        key: record.key().to_owned(),
                    });
                }
            }
        }

        let mut keys = Vec::with_capacity(records.len());
        for record in records {
            let key = record.key().to_owned();
            let replaced = state.insert(Arc::new(record));
            if replaced {
                tracing::debug!(skill = %key, "skill replaced");
            } else {
                tracing::info!(skill = %key, "skill registered");
            }
            keys.push(key);
        }
        Ok(keys)
    }

    /// Remove by exact key, or else every record with that name.
    ///
    /// Returns whether anything was removed; a missing skill is not an
    /// error.
    pub fn remove(&self, name_or_key: &str) -> bool {
        let mut state = self.write();

        if state.remove(name_or_key).is_some() {
            tracing::info!(skill = %name_or_key, "skill removed");
            return true;
        }

        let keys: Vec<String> = state
            .ordered()
            .filter(|r| r.name() == name_or_key)
            .map(|r| r.key().to_owned())
            .collect();
        for key in &keys {
            state.remove(key);
            tracing::info!(skill = %key, "skill removed");
        }
        !keys.is_empty()
    }

    /// Remove every record.
    ///
    /// Tracker history goes with the records, except where another registry
    /// (a snapshot or a set-operation result) still holds them.
    pub fn clear(&self) {
        let mut state = self.write();
        let count = state.entries.len();
        *state = RegistryState::default();
        tracing::info!(count, "registry cleared");
    }

    // -- Enumeration ---------------------------------------------------------

    /// Names in registration order.  Several keys may share a name.
    pub fn get_names(&self) -> Vec<String> {
        self.read().ordered().map(|r| r.name().to_owned()).collect()
    }

    /// Keys in registration order.
    pub fn get_keys(&self) -> Vec<String> {
        self.read().ordered().map(|r| r.key().to_owned()).collect()
    }

    /// Records in registration order.
    pub fn records(&self) -> Vec<Arc<SkillRecord>> {
        self.read().ordered().cloned().collect()
    }

    /// `(key, record)` pairs in registration order.
    pub fn skills_with_keys(&self) -> Vec<(String, Arc<SkillRecord>)> {
        self.read()
            .ordered()
            .map(|r| (r.key().to_owned(), Arc::clone(r)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }

    /// Whether `key` is registered.
    pub fn contains(&self, key: &str) -> bool {
        self.read().entries.contains_key(key)
    }

    /// Snapshot of the tag index.
    pub fn tag_index(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.read()
            .tag_index
            .iter()
            .map(|(tag, keys)| (tag.clone(), keys.iter().cloned().collect()))
            .collect()
    }

    // -- Lookup --------------------------------------------------------------

    /// Look up a record by exact key.
    pub fn get(&self, key: &str) -> Result<Arc<SkillRecord>> {
        self.read()
            .entries
            .get(key)
            .map(|e| Arc::clone(&e.record))
            .ok_or_else(|| SkillError::NotFound(key.to_owned()))
    }

    /// First record with this name, by registration order.
    pub fn get_by_name(&self, name: &str) -> Result<Arc<SkillRecord>> {
        self.read()
            .ordered()
            .find(|r| r.name() == name)
            .cloned()
            .ok_or_else(|| SkillError::NotFound(name.to_owned()))
    }

    /// Look up by key, falling back to the first name match.
    pub fn resolve(&self, name_or_key: &str) -> Result<Arc<SkillRecord>> {
        self.read()
            .resolve(name_or_key)
            .cloned()
            .ok_or_else(|| SkillError::NotFound(name_or_key.to_owned()))
    }

    /// Names of the skills carrying **every** tag in `tags`.
    ///
    /// An empty tag list matches nothing.
    pub fn get_by_tag<I, S>(&self, tags: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.get_by_tags(tags, TagMatch::All)
            .iter()
            .map(|r| r.name().to_owned())
            .collect()
    }

    /// Keys of the skills carrying every tag in `tags`.
    pub fn get_keys_by_tag<I, S>(&self, tags: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.get_by_tags(tags, TagMatch::All)
            .iter()
            .map(|r| r.key().to_owned())
            .collect()
    }

    /// Records matching `tags` under the given rule, in registration order.
    pub fn get_by_tags<I, S>(&self, tags: I, rule: TagMatch) -> Vec<Arc<SkillRecord>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags: Vec<S> = tags.into_iter().collect();
        if tags.is_empty() {
            return Vec::new();
        }

        let state = self.read();
        let empty = HashSet::new();
        let mut sets = tags
            .iter()
            .map(|t| state.tag_index.get(t.as_ref()).unwrap_or(&empty));

        let matching: HashSet<&str> = match rule {
            TagMatch::All => {
                let first: HashSet<&str> = sets
                    .next()
                    .map(|s| s.iter().map(String::as_str).collect())
                    .unwrap_or_default();
                sets.fold(first, |acc, set| {
                    acc.into_iter().filter(|k| set.contains(*k)).collect()
                })
            }
            TagMatch::Any => sets.flatten().map(String::as_str).collect(),
        };

        tracing::debug!(tags = tags.len(), ?rule, matches = matching.len(), "tag query");

        state
            .ordered()
            .filter(|r| matching.contains(r.key()))
            .cloned()
            .collect()
    }

    /// Every tag in use, sorted.
    pub fn all_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.read().tag_index.keys().cloned().collect();
        tags.sort();
        tags
    }

    // -- Metadata ------------------------------------------------------------

    /// Full metadata bag of a skill.
    pub fn get_metadata(&self, name_or_key: &str) -> Result<Map<String, Value>> {
        Ok(self.resolve(name_or_key)?.metadata())
    }

    /// Metadata of the first skill named `name`.
    pub fn get_metadata_by_name(&self, name: &str) -> Result<Map<String, Value>> {
        Ok(self.get_by_name(name)?.metadata())
    }

    /// `(key, metadata)` for every skill, in registration order.
    pub fn all_metadata(&self) -> Vec<(String, Map<String, Value>)> {
        self.read()
            .ordered()
            .map(|r| (r.key().to_owned(), r.metadata()))
            .collect()
    }

    /// Shallow-merge `patch` into a skill's metadata.
    ///
    /// `description` (string) and `tags` (array of strings) update the core
    /// fields and the tag index.  `key`, `name` and `parameters` are
    /// reserved.  Every other entry overwrites or extends the extra
    /// metadata.  The patch is validated in full before anything changes.
    pub fn update_metadata(&self, name_or_key: &str, patch: Map<String, Value>) -> Result<()> {
        let mut state = self.write();
        let current = state
            .resolve(name_or_key)
            .cloned()
            .ok_or_else(|| SkillError::NotFound(name_or_key.to_owned()))?;

        let invalid = |reason: String| SkillError::InvalidSkill {
            name: current.name().to_owned(),
            reason,
        };

        let mut updated = (*current).clone();
        for (field, value) in patch {
            match field.as_str() {
                f if RESERVED_METADATA_KEYS.contains(&f) => {
                    return Err(invalid(format!("metadata field `{f}` cannot be updated")));
                }
                "description" => {
                    let text = value
                        .as_str()
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .ok_or_else(|| invalid("`description` must be a non-empty string".into()))?;
                    updated.set_description(text.to_owned());
                }
                "tags" => {
                    let tags = value
                        .as_array()
                        .and_then(|items| items.iter().map(Value::as_str).collect::<Option<Vec<&str>>>())
                        .ok_or_else(|| invalid("`tags` must be an array of strings".into()))?;
                    updated.set_tags(normalize_tags(tags));
                }
                _ => {
                    updated.extra_mut().insert(field, value);
                }
            }
        }

        tracing::debug!(skill = %current.key(), "metadata updated");
        state.insert(Arc::new(updated));
        Ok(())
    }

    // -- Invocation ----------------------------------------------------------

    /// Run a skill and record the call in its tracker.
    ///
    /// The registry lock is released before the skill runs.  A skill's own
    /// error is recorded, then returned unchanged inside
    /// [`SkillError::Invocation`].
    pub fn invoke(&self, name_or_key: &str, args: &SkillArgs) -> Result<Value> {
        let record = self.resolve(name_or_key)?;
        tracing::debug!(skill = %record.key(), args = args.args.len(), kwargs = args.kwargs.len(), "invoking skill");
        record.call(args)
    }

    /// Run, plan, or dispatch a skill according to `mode`.
    pub fn invoke_with_mode(
        &self,
        name_or_key: &str,
        args: SkillArgs,
        mode: ExecutionMode,
    ) -> Result<Invocation> {
        let record = self.resolve(name_or_key)?;
        match mode {
            ExecutionMode::WaitResponse => record.call(&args).map(Invocation::Completed),
            ExecutionMode::GetArgs => {
                tracing::debug!(skill = %record.key(), "planned skill call");
                Ok(Invocation::Planned {
                    key: record.key().to_owned(),
                    args,
                })
            }
            ExecutionMode::ExecutionOnly => {
                let key = record.key().to_owned();
                let handle = std::thread::Builder::new()
                    .name(format!("skill-{key}"))
                    .spawn(move || {
                        let outcome = record.call(&args);
                        record.tracker().forget_current_thread();
                        outcome
                    })
                    .map_err(|e| SkillError::Invocation {
                        key: key.clone(),
                        source: Arc::new(e),
                    })?;
                tracing::debug!(skill = %key, "dispatched skill call");
                Ok(Invocation::Dispatched(handle))
            }
        }
    }

    /// Last call of a skill from the current thread.
    pub fn get_last_call(&self, name_or_key: &str) -> Result<LastCall> {
        Ok(self.resolve(name_or_key)?.tracker().get_last_call())
    }

    /// Result of a skill's last call from the current thread.
    pub fn get_last_result(&self, name_or_key: &str) -> Result<Option<Value>> {
        Ok(self.resolve(name_or_key)?.tracker().get_last_result())
    }

    /// Arguments of a skill's last call from the current thread.
    pub fn get_last_params(&self, name_or_key: &str) -> Result<SkillArgs> {
        Ok(self.resolve(name_or_key)?.tracker().get_last_params())
    }

    // -- Derived registries --------------------------------------------------

    /// Independent registry holding the same records.
    pub fn snapshot(&self) -> Self {
        Self::from_records((*self.config).clone(), self.records())
    }

    /// Independent registry holding only the skills whose key or name is in
    /// `selectors`, in registration order.
    pub fn subset<I, S>(&self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let wanted: HashSet<String> = selectors
            .into_iter()
            .map(|s| s.as_ref().to_owned())
            .collect();
        let records = self
            .records()
            .into_iter()
            .filter(|r| wanted.contains(r.key()) || wanted.contains(r.name()));
        Self::from_records((*self.config).clone(), records)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
