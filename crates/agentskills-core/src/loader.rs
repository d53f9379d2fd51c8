//! Skill loader: discovers skills and registers them.
//!
//! Skills reach a registry from three kinds of source:
//!
//! - **Manifest files**: TOML files declaring skills and naming the
//!   handler behind each one (see [`crate::manifest`]).  Handlers are looked
//!   up in a [`HandlerCatalog`] the host program fills in.
//! - **Folders**: every manifest directly inside a directory, in file-name
//!   order.  Subdirectories are not scanned.
//! - **Modules**: in-memory [`SkillModule`] implementations, including the
//!   caller's own module bound through [`SkillLoader::with_current`].
//!
//! Loading is all-or-nothing per source: a file or folder that fails to
//! parse or resolve registers nothing.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::LoaderConfig;
use crate::error::{Result, SkillError};
use crate::manifest::{Manifest, SkillEntry};
use crate::record::{SkillFn, SkillRecord};
use crate::registry::SkillRegistry;

// ---------------------------------------------------------------------------
// Handler catalog
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct Handler {
    callable: SkillFn,
    doc: Option<String>,
}

/// String-keyed table of the callables manifests may refer to.
#[derive(Clone, Default)]
pub struct HandlerCatalog {
    handlers: BTreeMap<String, Handler>,
}

impl fmt::Debug for HandlerCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerCatalog")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl HandlerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an undocumented handler.  Manifest entries using it must supply
    /// a description.
    pub fn with_handler(mut self, name: impl Into<String>, callable: SkillFn) -> Self {
        self.insert(name, callable, None);
        self
    }

    /// Add a handler with its own documentation, used as the description
    /// of entries that do not declare one.
    pub fn with_documented(
        mut self,
        name: impl Into<String>,
        doc: impl Into<String>,
        callable: SkillFn,
    ) -> Self {
        self.insert(name, callable, Some(doc.into()));
        self
    }

    /// Add or replace a handler.
    pub fn insert(&mut self, name: impl Into<String>, callable: SkillFn, doc: Option<String>) {
        self.handlers.insert(name.into(), Handler { callable, doc });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Handler names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    fn get(&self, name: &str) -> Option<&Handler> {
        self.handlers.get(name)
    }
}

// ---------------------------------------------------------------------------
// Modules
// ---------------------------------------------------------------------------

/// An in-memory source of skills.
///
/// The loader registers every record the module exposes under the module's
/// name as namespace.
pub trait SkillModule: Send + Sync {
    /// Module name, used as the namespace of its skills.
    fn name(&self) -> &str;

    /// Records this module contributes.
    fn skills(&self) -> Result<Vec<SkillRecord>>;
}

/// A [`SkillModule`] holding a fixed list of records.
#[derive(Debug, Clone)]
pub struct StaticModule {
    name: String,
    records: Vec<SkillRecord>,
}

impl StaticModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Vec::new(),
        }
    }

    pub fn with_skill(mut self, record: SkillRecord) -> Self {
        self.records.push(record);
        self
    }
}

impl SkillModule for StaticModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn skills(&self) -> Result<Vec<SkillRecord>> {
        Ok(self.records.clone())
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Tag filter applied to folder loads.
///
/// A skill passes when it carries **every** tag in `by_tags` and **none** of
/// the tags in `exclude_tags`.  Exclusion wins over inclusion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadFilter {
    pub by_tags: Vec<String>,
    pub exclude_tags: Vec<String>,
}

impl LoadFilter {
    /// Filter that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.by_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn exclude_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn matches(&self, record: &SkillRecord) -> bool {
        if self.exclude_tags.iter().any(|t| record.has_tag(t)) {
            return false;
        }
        self.by_tags.iter().all(|t| record.has_tag(t))
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Populates a [`SkillRegistry`] from manifests, folders and modules.
#[derive(Clone)]
pub struct SkillLoader {
    registry: SkillRegistry,
    catalog: Arc<HandlerCatalog>,
    config: LoaderConfig,
    current: Option<Arc<dyn SkillModule>>,
}

impl fmt::Debug for SkillLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkillLoader")
            .field("catalog", &self.catalog)
            .field("config", &self.config)
            .field("current", &self.current.as_ref().map(|m| m.name().to_owned()))
            .finish_non_exhaustive()
    }
}

impl SkillLoader {
    /// Create a loader that resolves handlers through `catalog` and
    /// registers into `registry`.
    pub fn new(registry: SkillRegistry, catalog: HandlerCatalog) -> Self {
        Self {
            registry,
            catalog: Arc::new(catalog),
            config: LoaderConfig::default(),
            current: None,
        }
    }

    pub fn with_config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Bind the caller's own module, loaded by [`SkillLoader::from_current`].
    pub fn with_current(mut self, module: impl SkillModule + 'static) -> Self {
        self.current = Some(Arc::new(module));
        self
    }

    /// The registry this loader writes to.
    pub fn registry(&self) -> &SkillRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &HandlerCatalog {
        &self.catalog
    }

    // -- Parsing -------------------------------------------------------------

    /// Parse one manifest file into records without registering them.
    pub fn load_file(&self, path: &Path) -> Result<Vec<SkillRecord>> {
        if !path.exists() {
            return Err(SkillError::SourceNotFound {
                path: path.to_path_buf(),
            });
        }

        let text = std::fs::read_to_string(path).map_err(|e| SkillError::load(path, e.to_string()))?;
        let manifest = Manifest::parse(&text, path)?;
        let namespace = manifest.namespace_for(path)?;

        let records = manifest
            .skills
            .iter()
            .map(|entry| self.build_record(entry, &namespace, path))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(path = %path.display(), namespace = %namespace, count = records.len(), "manifest parsed");
        Ok(records)
    }

    fn build_record(&self, entry: &SkillEntry, namespace: &str, path: &Path) -> Result<SkillRecord> {
        let handler_name = entry.handler_name();
        let handler = self.catalog.get(handler_name).ok_or_else(|| {
            SkillError::load(
                path,
                format!(
                    "skill `{}` refers to unknown handler `{handler_name}` (known: {})",
                    entry.name,
                    self.catalog.names().join(", ")
                ),
            )
        })?;

        let mut builder = SkillRecord::builder(entry.name.clone(), Arc::clone(&handler.callable))
            .namespace(namespace)
            .tags(entry.tags.iter().cloned());
        if let Some(description) = &entry.description {
            builder = builder.description(description.clone());
        }
        if let Some(doc) = &handler.doc {
            builder = builder.doc(doc.clone());
        }
        for (param, doc) in &entry.parameters {
            builder = builder.param(param.clone(), doc.clone());
        }
        for (key, value) in &entry.metadata {
            builder = builder.meta(key.clone(), value.clone());
        }

        builder.build().map_err(|e| SkillError::load(path, e.to_string()))
    }

    /// Parse every manifest directly inside `dir` and apply `filter`.
    pub fn load_folder(&self, dir: &Path, filter: &LoadFilter) -> Result<Vec<SkillRecord>> {
        if !dir.exists() {
            return Err(SkillError::SourceNotFound {
                path: dir.to_path_buf(),
            });
        }
        if !dir.is_dir() {
            return Err(SkillError::load(dir, "not a directory"));
        }

        let mut files: Vec<PathBuf> = Vec::new();
        let entries = std::fs::read_dir(dir).map_err(|e| SkillError::load(dir, e.to_string()))?;
        for entry in entries {
            let path = entry.map_err(|e| SkillError::load(dir, e.to_string()))?.path();
            if path.is_file() && self.config.accepts(&path) {
                files.push(path);
            } else {
                tracing::trace!(path = %path.display(), "not a skill manifest, skipping");
            }
        }
        files.sort();

        let mut records = Vec::new();
        for file in &files {
            for record in self.load_file(file)? {
                if filter.matches(&record) {
                    records.push(record);
                } else {
                    tracing::debug!(skill = %record.key(), "skill filtered out");
                }
            }
        }

        tracing::debug!(dir = %dir.display(), files = files.len(), count = records.len(), "folder parsed");
        Ok(records)
    }

    // -- Registration --------------------------------------------------------

    /// Load one manifest and register its skills.  Returns how many.
    pub fn from_file(&self, path: &Path) -> Result<usize> {
        let records = self.load_file(path)?;
        let count = self.register(records)?;
        tracing::info!(path = %path.display(), count, "skills loaded from file");
        Ok(count)
    }

    /// Load every manifest in `dir` and register the skills passing
    /// `filter`.  Returns how many.
    pub fn from_folder(&self, dir: &Path, filter: &LoadFilter) -> Result<usize> {
        let records = self.load_folder(dir, filter)?;
        let count = self.register(records)?;
        tracing::info!(dir = %dir.display(), count, "skills loaded from folder");
        Ok(count)
    }

    /// Register the skills of an in-memory module under its name.
    ///
    /// Each registered record starts with an empty call history, so
    /// registries loading the same module do not see each other's calls.
    pub fn from_module(&self, module: &dyn SkillModule) -> Result<usize> {
        let namespace = module.name().trim();
        if namespace.is_empty() || namespace.contains('.') {
            return Err(SkillError::InvalidSkill {
                name: namespace.to_owned(),
                reason: "module name must be non-empty and must not contain `.`".into(),
            });
        }

        let records = module
            .skills()?
            .iter()
            .map(|r| r.with_namespace(namespace).with_fresh_tracker())
            .collect();
        let count = self.register(records)?;
        tracing::info!(module = %namespace, count, "skills loaded from module");
        Ok(count)
    }

    /// Register the skills of the module bound with
    /// [`SkillLoader::with_current`].  Returns 0 when none is bound.
    pub fn from_current(&self) -> Result<usize> {
        match &self.current {
            Some(module) => self.from_module(module.as_ref()),
            None => {
                tracing::debug!("no current module bound");
                Ok(0)
            }
        }
    }

    /// Register a batch and count the distinct keys it produced.
    fn register(&self, records: Vec<SkillRecord>) -> Result<usize> {
        let keys = self.registry.register_all(records)?;
        let distinct: HashSet<&str> = keys.iter().map(String::as_str).collect();
        if distinct.len() < keys.len() {
            tracing::debug!(
                declared = keys.len(),
                distinct = distinct.len(),
                "batch declared the same key more than once, last one kept"
            );
        }
        Ok(distinct.len())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
