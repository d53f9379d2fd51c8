//! Skill registry for agentskills.
//!
//! This crate provides:
//!
//! - **Skill records**: a callable plus its description, tags, parameter
//!   docs and free-form metadata, built through [`SkillRecord::builder`].
//!
//! - **Skill registry**: a shared, thread-safe `key → record` mapping with
//!   a tag index (AND semantics for multi-tag queries), metadata updates and
//!   invocation in three [`ExecutionMode`]s.
//!
//! - **Execution tracking**: every skill remembers its last call (arguments,
//!   result or error) per calling thread.
//!
//! - **Set operations**: union, intersection, difference and symmetric
//!   difference of two registries, producing a new one.
//!
//! - **Skill loader**: registers skills from TOML manifests, folders of
//!   manifests and in-memory modules, resolving handlers through a
//!   [`HandlerCatalog`].
//!
//! - **Tool definitions**: JSON-schema descriptions of registered skills
//!   for an external agent.
//!
//! # Example
//!
//! ```rust,no_run
//! use agentskills_core::{HandlerCatalog, LoadFilter, SkillArgs, SkillLoader, SkillRegistry, skill_fn};
//! use serde_json::json;
//! use std::path::Path;
//!
//! let catalog = HandlerCatalog::new().with_documented(
//!     "sum",
//!     "Sum of a list of numbers.",
//!     skill_fn(|args| {
//!         let numbers: Vec<f64> = args.required(0, "numbers")?;
//!         Ok(json!(numbers.iter().sum::<f64>()))
//!     }),
//! );
//!
//! let loader = SkillLoader::new(SkillRegistry::new(), catalog);
//! loader.from_folder(Path::new("skills"), &LoadFilter::new().by_tags(["math"])).unwrap();
//!
//! let registry = loader.registry();
//! let total = registry.invoke("sum", &SkillArgs::new().arg(json!([1, 2, 3]))).unwrap();
//! println!("{total} via {:?}", registry.get_last_params("sum").unwrap());
//! ```

pub mod config;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod mode;
pub mod ops;
pub mod record;
pub mod registry;
pub mod tools;
pub mod tracker;

pub use config::{
    AgentSkillsConfig, ConflictPolicy, LoaderConfig, RegistryConfig, SKILLS_DIR_ENV,
    default_skills_dir,
};
pub use error::{BoxError, Result, SkillError, SkillFault};
pub use loader::{HandlerCatalog, LoadFilter, SkillLoader, SkillModule, StaticModule};
pub use manifest::{Manifest, SkillEntry};
pub use mode::{ExecutionMode, Invocation};
pub use record::{
    ArgumentError, DEFAULT_NAMESPACE, SkillArgs, SkillFn, SkillRecord, SkillRecordBuilder,
    skill_fn,
};
pub use registry::{SkillRegistry, TagMatch};
pub use tools::{ToolDefinition, tool_name};
pub use tracker::{CallStatus, ExecutionTracker, LastCall};
