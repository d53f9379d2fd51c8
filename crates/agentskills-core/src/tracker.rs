//! Execution tracking.
//!
//! Every skill carries an [`ExecutionTracker`] holding a single-slot record
//! of its most recent invocation: the arguments it received, the value it
//! returned or the error it raised, and when the call happened.
//!
//! Slots are scoped to the calling thread.  Two threads invoking the same
//! skill concurrently each see their own last call, while
//! [`ExecutionTracker::latest_call`] reports the most recent call from any
//! thread.  Each call assembles its [`LastCall`] locally and publishes it in
//! a single insert, so readers never observe a half-written record.

use std::sync::{Arc, RwLock};
use std::thread::{self, ThreadId};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::{Map, Value};

use crate::error::SkillFault;
use crate::record::SkillArgs;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Outcome of the most recent invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallStatus {
    /// The skill has not been invoked in this context.
    NeverCalled,
    /// The last invocation returned a value.
    CalledOk,
    /// The last invocation raised an error.
    CalledError,
}

/// Record of a single invocation.
///
/// Before the first call every field is empty; [`LastCall::default`] is the
/// "never called" record.
#[derive(Debug, Clone, Default)]
pub struct LastCall {
    /// Positional arguments.
    pub args: Vec<Value>,
    /// Named arguments.
    pub kwargs: Map<String, Value>,
    /// Returned value, cleared when the call failed.
    pub result: Option<Value>,
    /// Raised error, cleared when the call succeeded.
    pub exception: Option<SkillFault>,
    /// When the call finished.
    pub called_at: Option<DateTime<Utc>>,
}

impl LastCall {
    pub(crate) fn completed(args: &SkillArgs, outcome: &Result<Value, SkillFault>) -> Self {
        let (result, exception) = match outcome {
            Ok(value) => (Some(value.clone()), None),
            Err(fault) => (None, Some(Arc::clone(fault))),
        };
        Self {
            args: args.args.clone(),
            kwargs: args.kwargs.clone(),
            result,
            exception,
            called_at: Some(Utc::now()),
        }
    }

    /// Derive the tracker state this record represents.
    pub fn status(&self) -> CallStatus {
        match (self.called_at, &self.exception) {
            (None, _) => CallStatus::NeverCalled,
            (Some(_), Some(_)) => CallStatus::CalledError,
            (Some(_), None) => CallStatus::CalledOk,
        }
    }

    /// The arguments of this call as a [`SkillArgs`] value.
    pub fn params(&self) -> SkillArgs {
        SkillArgs {
            args: self.args.clone(),
            kwargs: self.kwargs.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Slots {
    per_thread: DashMap<ThreadId, LastCall>,
    latest: RwLock<Option<LastCall>>,
}

/// Per-skill execution tracker.
///
/// Cloning the tracker shares the underlying slots; clones of a
/// [`SkillRecord`](crate::SkillRecord) therefore report the same history.
#[derive(Debug, Clone, Default)]
pub struct ExecutionTracker {
    slots: Arc<Slots>,
}

impl ExecutionTracker {
    /// Create a tracker with no recorded calls.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the record of a finished call for the current thread.
    pub(crate) fn record(&self, call: LastCall) {
        self.slots
            .per_thread
            .insert(thread::current().id(), call.clone());
        let mut latest = self
            .slots
            .latest
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *latest = Some(call);
    }

    /// Drop the current thread's slot, keeping `latest`.  Used by threads
    /// that exit right after their call.
    pub(crate) fn forget_current_thread(&self) {
        self.slots.per_thread.remove(&thread::current().id());
    }

    #[cfg(test)]
    pub(crate) fn thread_slots(&self) -> usize {
        self.slots.per_thread.len()
    }

    /// Last call made from the current thread.
    pub fn get_last_call(&self) -> LastCall {
        self.slots
            .per_thread
            .get(&thread::current().id())
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Result of the last call made from the current thread.
    pub fn get_last_result(&self) -> Option<Value> {
        self.get_last_call().result
    }

    /// Arguments of the last call made from the current thread.
    pub fn get_last_params(&self) -> SkillArgs {
        self.get_last_call().params()
    }

    /// State of the current thread's slot.
    pub fn status(&self) -> CallStatus {
        self.get_last_call().status()
    }

    /// Most recent call from any thread.
    pub fn latest_call(&self) -> LastCall {
        self.slots
            .latest
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .unwrap_or_default()
    }

    /// Forget every recorded call.
    pub fn reset(&self) {
        self.slots.per_thread.clear();
        *self
            .slots
            .latest
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
