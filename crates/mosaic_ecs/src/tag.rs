//! Tag component types: zero-attribute markers memoized by name.

use std::collections::HashMap;
use std::sync::Mutex;

use lazy_static::lazy_static;

use crate::schema::ComponentType;

lazy_static! {
    // Process-wide registry of tag types, created lazily and never removed.
    static ref TAGS: Mutex<HashMap<&'static str, ComponentType>> = Mutex::new(HashMap::new());
}

/// Returns the canonical zero-attribute component type for `name`.
///
/// The name is canonicalized first, so `tag("Destroyed")` and
/// `tag("destroyed")` yield the identical type, and a filter declared with
/// `ComponentKey::from_name("destroyed")` matches components constructed
/// from either call's result. The type is memoized for the life of the
/// process.
#[must_use]
pub fn tag(name: &str) -> ComponentType {
    let ty = ComponentType::declare(name);
    let mut tags = TAGS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    tags.entry(ty.name()).or_insert(ty).clone()
}
