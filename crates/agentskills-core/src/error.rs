//! Error types for the skill registry.
//!
//! Registry-level failures (invalid registrations, missing skills, broken
//! sources) are always surfaced to the caller.  A skill's own failure during
//! invocation is carried unchanged inside [`SkillError::Invocation`] so the
//! caller can still downcast it to the skill's concrete error type.

use std::path::PathBuf;
use std::sync::Arc;

/// Boxed error returned by skill callables.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A skill's own error, shared between the tracker and the caller.
pub type SkillFault = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Skill registry errors.
#[derive(Debug, thiserror::Error)]
pub enum SkillError {
    #[error("invalid skill `{name}`: {reason}")]
    InvalidSkill { name: String, reason: String },

    #[error("skill key `{key}` is already registered")]
    DuplicateKey { key: String },

    #[error("skill not found: `{0}`")]
    NotFound(String),

    #[error("skill source not found: `{}`", .path.display())]
    SourceNotFound { path: PathBuf },

    #[error("failed to load skills from `{}`: {reason}", .path.display())]
    Load { path: PathBuf, reason: String },

    #[error("skill `{key}` failed: {source}")]
    Invocation {
        key: String,
        #[source]
        source: SkillFault,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl SkillError {
    /// The skill's original error, if this is an invocation failure.
    pub fn skill_fault(&self) -> Option<&SkillFault> {
        match self {
            Self::Invocation { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Whether this error means the requested skill does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub(crate) fn load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SkillError>;
