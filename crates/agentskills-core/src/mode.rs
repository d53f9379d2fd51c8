//! Per-call execution modes.

use std::fmt;
use std::str::FromStr;
use std::thread::JoinHandle;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SkillError};
use crate::record::SkillArgs;

/// How [`SkillRegistry::invoke_with_mode`](crate::SkillRegistry::invoke_with_mode)
/// treats a call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Run the skill and wait for its result.
    #[default]
    WaitResponse,
    /// Resolve the skill and hand back the planned call without running it.
    GetArgs,
    /// Run the skill on its own thread and return immediately.
    ExecutionOnly,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaitResponse => write!(f, "wait_response"),
            Self::GetArgs => write!(f, "get_args"),
            Self::ExecutionOnly => write!(f, "execution_only"),
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = SkillError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "wait_response" => Ok(Self::WaitResponse),
            "get_args" => Ok(Self::GetArgs),
            "execution_only" => Ok(Self::ExecutionOnly),
            other => Err(SkillError::Config(format!("unknown execution mode `{other}`"))),
        }
    }
}

/// What an invocation produced, depending on its [`ExecutionMode`].
#[derive(Debug)]
pub enum Invocation {
    /// The skill ran and returned this value.
    Completed(Value),
    /// The skill was resolved but not run.
    Planned { key: String, args: SkillArgs },
    /// The skill is running on a caller-owned thread.
    Dispatched(JoinHandle<Result<Value>>),
}

impl Invocation {
    /// The returned value, when the skill ran to completion synchronously.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Completed(value) => Some(value),
            _ => None,
        }
    }
}
