//! CLI argument definitions for agentskills.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// agentskills -- inspect, combine and run skill registries.
#[derive(Parser)]
#[command(
    name = "agentskills",
    version,
    about = "agentskills -- inspect, combine and run skill registries",
    long_about = "Loads skills from TOML manifests, filters them by tag, combines \
                  registries with set operations and invokes skills backed by the \
                  built-in handler catalog."
)]
pub struct Cli {
    /// Configuration file (TOML).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Default log level when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the skills in a folder.
    List {
        /// Skills folder (defaults to the configured one).
        #[arg(long, short)]
        dir: Option<PathBuf>,

        /// Keep only skills carrying this tag (repeatable; all must match).
        #[arg(long = "tag", short)]
        tags: Vec<String>,

        /// Drop skills carrying this tag (repeatable).
        #[arg(long = "exclude-tag", short = 'x')]
        exclude_tags: Vec<String>,
    },

    /// Print the full metadata of one skill as JSON.
    Show {
        /// Skill name or key.
        name: String,

        #[arg(long, short)]
        dir: Option<PathBuf>,
    },

    /// Combine the skills of two folders and print the resulting keys.
    Combine {
        op: SetOp,
        dir_a: PathBuf,
        dir_b: PathBuf,
    },

    /// Invoke a skill and print its result and last-call record.
    Invoke {
        /// Skill name or key.
        name: String,

        #[arg(long, short)]
        dir: Option<PathBuf>,

        /// Positional arguments as a JSON array.
        #[arg(long, default_value = "[]")]
        args: String,

        /// Named arguments as a JSON object.
        #[arg(long, default_value = "{}")]
        kwargs: String,

        /// Execution mode: wait_response, get_args or execution_only.
        #[arg(long, short, default_value = "wait_response")]
        mode: String,
    },

    /// Print tool definitions for every skill as JSON.
    Tools {
        #[arg(long, short)]
        dir: Option<PathBuf>,
    },
}

/// Set operation applied by `combine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SetOp {
    Union,
    Intersection,
    Difference,
    SymmetricDifference,
}
