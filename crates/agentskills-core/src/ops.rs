//! Set algebra over registries.
//!
//! Every operation returns a brand-new [`SkillRegistry`] and leaves both
//! operands untouched.  Skills are compared by key; the result inherits the
//! first operand's configuration and shares records (and therefore their
//! callables and trackers) with the operands.
//!
//! Result ordering:
//!
//! - [`union`]: `a`'s keys in `a`'s order, then `b`-only keys in `b`'s
//!   order.  On a shared key `b`'s record wins.
//! - [`intersection`] / [`difference`]: `a`'s order, `a`'s records.
//! - [`symmetric_difference`]: `a`-only keys, then `b`-only keys.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::record::SkillRecord;
use crate::registry::SkillRegistry;

fn keyed(registry: &SkillRegistry) -> HashMap<String, Arc<SkillRecord>> {
    registry.skills_with_keys().into_iter().collect()
}

fn derive<I>(a: &SkillRegistry, records: I) -> SkillRegistry
where
    I: IntoIterator<Item = Arc<SkillRecord>>,
{
    SkillRegistry::from_records(a.config().clone(), records)
}

/// Every skill in either registry.  `b` wins on key collisions.
pub fn union(a: &SkillRegistry, b: &SkillRegistry) -> SkillRegistry {
    let left = a.records();
    let right = b.records();
    let right_keyed: HashMap<&str, &Arc<SkillRecord>> =
        right.iter().map(|r| (r.key(), r)).collect();
    let left_keys: HashSet<&str> = left.iter().map(|r| r.key()).collect();

    let merged = left
        .iter()
        .map(|r| Arc::clone(right_keyed.get(r.key()).copied().unwrap_or(r)))
        .chain(
            right
                .iter()
                .filter(|r| !left_keys.contains(r.key()))
                .cloned(),
        )
        .collect::<Vec<_>>();

    tracing::debug!(left = left.len(), right = right.len(), result = merged.len(), "registry union");
    derive(a, merged)
}

/// Skills whose key is in both registries, taken from `a`.
pub fn intersection(a: &SkillRegistry, b: &SkillRegistry) -> SkillRegistry {
    let right = keyed(b);
    let records = a
        .records()
        .into_iter()
        .filter(|r| right.contains_key(r.key()))
        .collect::<Vec<_>>();
    tracing::debug!(result = records.len(), "registry intersection");
    derive(a, records)
}

/// Skills of `a` whose key is not in `b`.
pub fn difference(a: &SkillRegistry, b: &SkillRegistry) -> SkillRegistry {
    let right = keyed(b);
    let records = a
        .records()
        .into_iter()
        .filter(|r| !right.contains_key(r.key()))
        .collect::<Vec<_>>();
    tracing::debug!(result = records.len(), "registry difference");
    derive(a, records)
}

/// Skills in exactly one of the two registries.
pub fn symmetric_difference(a: &SkillRegistry, b: &SkillRegistry) -> SkillRegistry {
    let left = keyed(a);
    let right = keyed(b);
    let records = a
        .records()
        .into_iter()
        .filter(|r| !right.contains_key(r.key()))
        .chain(b.records().into_iter().filter(|r| !left.contains_key(r.key())))
        .collect::<Vec<_>>();
    tracing::debug!(result = records.len(), "registry symmetric difference");
    derive(a, records)
}

impl SkillRegistry {
    /// See [`union`].
    pub fn union(&self, other: &SkillRegistry) -> SkillRegistry {
        union(self, other)
    }

    /// See [`intersection`].
    pub fn intersection(&self, other: &SkillRegistry) -> SkillRegistry {
        intersection(self, other)
    }

    /// See [`difference`].
    pub fn difference(&self, other: &SkillRegistry) -> SkillRegistry {
        difference(self, other)
    }

    /// See [`symmetric_difference`].
    pub fn symmetric_difference(&self, other: &SkillRegistry) -> SkillRegistry {
        symmetric_difference(self, other)
    }
}
