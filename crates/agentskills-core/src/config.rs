//! Registry and loader configuration.
//!
//! [`RegistryConfig`] and [`LoaderConfig`] carry sensible defaults via
//! [`Default`] and a builder-style API for fluent customisation.
//! [`AgentSkillsConfig`] groups both and can be read from a TOML file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkillError};
use crate::record::DEFAULT_NAMESPACE;

/// Environment variable overriding the default skills directory.
pub const SKILLS_DIR_ENV: &str = "AGENTSKILLS_DIR";

/// What `register` does when the key is already present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Replace the existing record (reload workflows).
    #[default]
    Overwrite,
    /// Reject the registration with [`SkillError::DuplicateKey`].
    Error,
}

/// Registry behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Duplicate-key handling.
    ///
    /// Default: **overwrite**.
    pub conflict_policy: ConflictPolicy,

    /// Namespace applied to records registered without one.
    ///
    /// Default: **`local`**.
    pub default_namespace: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            conflict_policy: ConflictPolicy::Overwrite,
            default_namespace: DEFAULT_NAMESPACE.to_owned(),
        }
    }
}

impl RegistryConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    pub fn with_default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.default_namespace = namespace.into();
        self
    }
}

/// Loader behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// File extensions (without the dot) treated as skill manifests when
    /// scanning a folder.
    ///
    /// Default: **`["toml"]`**.
    pub extensions: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["toml".to_owned()],
        }
    }
}

impl LoaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Whether `path` has one of the configured extensions.
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
    }
}

/// Top-level configuration file.
///
/// ```toml
/// skills_dir = "skills"
///
/// [registry]
/// conflict_policy = "error"
///
/// [loader]
/// extensions = ["toml"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSkillsConfig {
    pub registry: RegistryConfig,
    pub loader: LoaderConfig,
    /// Folder scanned when no explicit folder is given.
    pub skills_dir: Option<PathBuf>,
}

impl AgentSkillsConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| SkillError::Config(e.to_string()))
    }

    /// Read a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SkillError::Config(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Folder to scan: the configured one, else [`default_skills_dir`].
    pub fn resolved_skills_dir(&self) -> PathBuf {
        self.skills_dir.clone().unwrap_or_else(default_skills_dir)
    }
}

/// Return the default skills directory path.
///
/// Priority:
/// 1. `$AGENTSKILLS_DIR` environment variable
/// 2. `./skills/` relative to the current working directory
pub fn default_skills_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(SKILLS_DIR_ENV) {
        return PathBuf::from(dir);
    }
    PathBuf::from("skills")
}
