//! Component instances, their type keys, and the per-entity store.
//!
//! A component type is identified by a [`ComponentKey`] derived from the
//! type's **canonical string name** using the FNV-1a 64-bit hash algorithm.
//! The hash is deterministic across runs, so keys can be declared as `const`s
//! in filter definitions and still match types registered at runtime.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Mutex;

use lazy_static::lazy_static;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Folds a type name into its canonical lower snake_case form.
///
/// Namespaced names keep only their last `::` segment, ASCII uppercase
/// letters become `_` plus the lowercase letter (except at the start), and
/// spaces and hyphens fold to `_`. `"Position"`, `"position"` and
/// `"Sample::Position"` all canonicalize to `"position"`.
#[must_use]
pub fn canonicalize(name: &str) -> String {
    let tail = name.rsplit("::").next().unwrap_or(name);
    let mut out = String::with_capacity(tail.len() + 4);
    for ch in tail.chars() {
        if ch.is_ascii_uppercase() {
            if !out.is_empty() {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else if ch == ' ' || ch == '-' {
            out.push('_');
        } else {
            out.push(ch);
        }
    }
    out
}

lazy_static! {
    // Canonical names referenced by runtime-built keys. Entries live for the
    // process lifetime, matching the never-removed type registry semantics.
    static ref INTERNED_NAMES: Mutex<HashSet<&'static str>> = Mutex::new(HashSet::new());
}

/// Returns a `'static` copy of `name`, leaking it at most once per unique
/// string.
pub(crate) fn intern(name: &str) -> &'static str {
    let mut names = INTERNED_NAMES
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    match names.get(name) {
        Some(interned) => interned,
        None => {
            let leaked: &'static str = Box::leak(name.to_owned().into_boxed_str());
            names.insert(leaked);
            leaked
        }
    }
}

/// A unique identifier for a component type, derived from its canonical
/// string name with the FNV-1a 64-bit hash algorithm.
///
/// The key carries the name it was derived from for diagnostics (errors,
/// logs, serialization); equality, ordering, and hashing use only the hash,
/// so keys built from the same canonical name are interchangeable no matter
/// where they were created.
#[derive(Debug, Clone, Copy)]
pub struct ComponentKey {
    hash: u64,
    name: &'static str,
}

impl ComponentKey {
    /// FNV-1a 64-bit offset basis.
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

    /// FNV-1a 64-bit prime.
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// Computes the key for an **already canonical** (lower snake_case) name.
    ///
    /// This is the `const` form used to declare filter keys:
    ///
    /// ```rust
    /// use mosaic_ecs::ComponentKey;
    ///
    /// const POSITION: ComponentKey = ComponentKey::from_name("position");
    /// ```
    ///
    /// # Panics
    ///
    /// Panics (at compile time in `const` contexts) when `name` contains
    /// anything other than lowercase ASCII letters, digits, or `_`. Use
    /// [`ComponentKey::of`] for uncanonicalized runtime names.
    #[must_use]
    pub const fn from_name(name: &'static str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            let byte = bytes[i];
            assert!(
                byte == b'_' || byte.is_ascii_lowercase() || byte.is_ascii_digit(),
                "component key names must be lower snake_case"
            );
            hash ^= byte as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self { hash, name }
    }

    /// Computes the key for an arbitrary runtime name, canonicalizing it
    /// first. The canonical name is interned so the key can carry it.
    #[must_use]
    pub fn of(name: &str) -> Self {
        let canonical = canonicalize(name);
        let interned = intern(&canonical);
        let bytes = interned.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        for byte in bytes {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(Self::FNV_PRIME);
        }
        Self {
            hash,
            name: interned,
        }
    }

    /// The canonical name this key was derived from.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The raw FNV-1a hash value.
    #[must_use]
    pub fn raw(&self) -> u64 {
        self.hash
    }
}

impl PartialEq for ComponentKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for ComponentKey {}

impl std::hash::Hash for ComponentKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl PartialOrd for ComponentKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ComponentKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.hash.cmp(&other.hash)
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A constructed component: a type key plus one JSON value per declared
/// attribute.
///
/// Components are built from a [`ComponentType`](crate::ComponentType) via
/// `construct`; every declared attribute is present in the value map
/// (override, else declared default, else `Null`). A component carries no
/// back-reference to the entity holding it.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    key: ComponentKey,
    values: Map<String, Value>,
}

impl Component {
    pub(crate) fn from_parts(key: ComponentKey, values: Map<String, Value>) -> Self {
        Self { key, values }
    }

    /// The type key of this component.
    #[must_use]
    pub fn key(&self) -> ComponentKey {
        self.key
    }

    /// The canonical name of this component's type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.key.name()
    }

    /// Reads an attribute value. Returns `None` for names the schema never
    /// declared; declared-but-unset attributes read as `Some(&Value::Null)`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Writes an attribute value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownAttribute`] when `name` was never declared on
    /// this component's schema, so typos fail loudly instead of growing the
    /// value map.
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        if !self.values.contains_key(name) {
            return Err(Error::UnknownAttribute {
                component: self.key.name(),
                attribute: name.to_owned(),
            });
        }
        self.values.insert(name.to_owned(), value);
        Ok(())
    }

    /// Iterates the attribute values in sorted key order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Serializes to `{ "type": name, attribute: value, .. }`.
    ///
    /// The underlying map is key-sorted, so equal components serialize
    /// identically regardless of construction order.
    #[must_use]
    pub fn serialize(&self) -> Value {
        let mut out = self.values.clone();
        out.insert("type".to_owned(), Value::String(self.type_name().to_owned()));
        Value::Object(out)
    }
}

/// Conversion into a constructed [`Component`].
///
/// Implemented for `Component` itself (identity) and, fallibly, for
/// component types: handing a bare type to a store is rejected with
/// [`Error::NotAComponent`] so the mistake surfaces at the call site instead
/// of as an index mismatch later.
pub trait IntoComponent {
    /// Converts `self` into a component, or explains why it is not one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAComponent`] when `self` is a type rather than an
    /// instance.
    fn into_component(self) -> Result<Component>;
}

impl IntoComponent for Component {
    fn into_component(self) -> Result<Component> {
        Ok(self)
    }
}

/// Per-entity mapping from component type key to the attached instance.
///
/// At most one instance of a type is attached at a time; adding a second
/// replaces the first under the same key and hands the displaced instance
/// back to the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentStore {
    slots: HashMap<ComponentKey, Component>,
}

impl ComponentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a component, keyed by its type. Returns the previously
    /// attached instance of that type, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAComponent`] when `component` is a bare type
    /// rather than a constructed instance.
    pub fn add(&mut self, component: impl IntoComponent) -> Result<Option<Component>> {
        let component = component.into_component()?;
        Ok(self.slots.insert(component.key(), component))
    }

    /// Detaches and returns the instance stored under `key`, if present.
    pub fn remove(&mut self, key: ComponentKey) -> Option<Component> {
        self.slots.remove(&key)
    }

    /// The instance stored under `key`, if present.
    #[must_use]
    pub fn get(&self, key: ComponentKey) -> Option<&Component> {
        self.slots.get(&key)
    }

    /// Mutable access to the instance stored under `key`, if present.
    pub fn get_mut(&mut self, key: ComponentKey) -> Option<&mut Component> {
        self.slots.get_mut(&key)
    }

    /// Whether an instance of `key`'s type is attached.
    #[must_use]
    pub fn contains(&self, key: ComponentKey) -> bool {
        self.slots.contains_key(&key)
    }

    /// Number of attached components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no components are attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterates the attached components. Order is the map's, not guaranteed
    /// stable across removals.
    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.slots.values()
    }

    /// Iterates the attached type keys.
    pub fn keys(&self) -> impl Iterator<Item = ComponentKey> + '_ {
        self.slots.keys().copied()
    }
}
