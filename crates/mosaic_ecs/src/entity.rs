//! Entity identity, id allocation, entity values, and spawn templates.
//!
//! An [`Entity`] is an id plus a bag of components. Ids come from an
//! [`EntityAllocator`] owned by whoever owns the entities (usually a
//! `World`); they increase monotonically and are never reused within a
//! process, even when an explicit id is supplied.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::component::{Component, ComponentKey, ComponentStore, canonicalize};
use crate::error::{Error, Result};
use crate::schema::{ComponentType, into_override_map};

/// A unique entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Create an id from a raw `u64`.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// The raw `u64` value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Allocates monotonically increasing entity ids.
///
/// Ids start at 1. An explicitly requested id is honored via
/// [`EntityAllocator::claim`], which never lets the counter fall below
/// `id + 1`, so later allocations stay unique.
#[derive(Debug, Clone)]
pub struct EntityAllocator {
    next: u64,
}

impl EntityAllocator {
    /// Creates a fresh allocator starting at id 1.
    #[must_use]
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Allocates the next id.
    pub fn allocate(&mut self) -> EntityId {
        let id = self.next;
        self.next += 1;
        EntityId(id)
    }

    /// Records an explicitly chosen id, raising the counter to at least
    /// `id + 1` so subsequent allocations cannot collide with it.
    pub fn claim(&mut self, id: u64) -> EntityId {
        self.next = self.next.max(id.saturating_add(1));
        EntityId(id)
    }

    /// The id the next [`allocate`](EntityAllocator::allocate) will return.
    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.next
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// An identity plus a bag of attached components.
///
/// Entities are plain owned values; putting one into a world transfers
/// ownership, and removing it hands the value back. An entity held inside a
/// world is only structurally mutated through the world's methods so the
/// type index stays consistent.
#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    kind: String,
    components: ComponentStore,
}

impl Entity {
    /// Creates an empty entity with a freshly allocated id.
    #[must_use]
    pub fn new(ids: &mut EntityAllocator) -> Self {
        Self {
            id: ids.allocate(),
            kind: "entity".to_owned(),
            components: ComponentStore::new(),
        }
    }

    /// Creates an empty entity with an explicit id, claiming it from the
    /// allocator.
    #[must_use]
    pub fn with_id(ids: &mut EntityAllocator, id: u64) -> Self {
        Self {
            id: ids.claim(id),
            kind: "entity".to_owned(),
            components: ComponentStore::new(),
        }
    }

    /// Sets the kind label used in serialization, returning the entity for
    /// chaining.
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// The entity id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The kind label (`"entity"` unless spawned from a template or set
    /// explicitly).
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The attached components.
    #[must_use]
    pub fn components(&self) -> &ComponentStore {
        &self.components
    }

    /// Mutable access to the attached components.
    ///
    /// Only meaningful for standalone entities; entities owned by a world
    /// are mutated through the world so the index observes every change.
    pub fn components_mut(&mut self) -> &mut ComponentStore {
        &mut self.components
    }

    /// The attached component of `key`'s type.
    ///
    /// This is the loud accessor: asking for a type the entity does not
    /// carry is an error, not an empty result. Use [`Entity::get`] for a
    /// quiet lookup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingComponent`] when no instance of the type is
    /// attached.
    pub fn component(&self, key: ComponentKey) -> Result<&Component> {
        self.components.get(key).ok_or(Error::MissingComponent {
            id: self.id,
            component: key.name(),
        })
    }

    /// Mutable form of [`Entity::component`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingComponent`] when no instance of the type is
    /// attached.
    pub fn component_mut(&mut self, key: ComponentKey) -> Result<&mut Component> {
        let id = self.id;
        self.components.get_mut(key).ok_or(Error::MissingComponent {
            id,
            component: key.name(),
        })
    }

    /// Quiet lookup of the attached component of `key`'s type.
    #[must_use]
    pub fn get(&self, key: ComponentKey) -> Option<&Component> {
        self.components.get(key)
    }

    /// Whether an instance of `key`'s type is attached.
    #[must_use]
    pub fn has(&self, key: ComponentKey) -> bool {
        self.components.contains(key)
    }

    /// Serializes to `{ "id", "kind", "components": { name: component } }`
    /// with components keyed (and therefore ordered) by canonical name.
    #[must_use]
    pub fn serialize(&self) -> Value {
        let components: BTreeMap<&str, Value> = self
            .components
            .iter()
            .map(|c| (c.type_name(), c.serialize()))
            .collect();
        json!({
            "id": self.id.value(),
            "kind": self.kind,
            "components": components,
        })
    }
}

/// A declarative recipe for spawning entities: a kind label, an ordered list
/// of component types with template-level default overrides, and an optional
/// post-construction hook.
///
/// ```rust
/// use serde_json::{Value, json};
/// use mosaic_ecs::{ComponentType, EntityAllocator, EntityTemplate};
///
/// let position = ComponentType::declare("position")
///     .attribute("x", json!(0.0))
///     .attribute("y", json!(0.0));
/// let player = EntityTemplate::new("player").component(&position, json!({ "x": 600.0 }));
///
/// let mut ids = EntityAllocator::new();
/// let spawned = player.spawn(&mut ids, json!({ "position": { "y": 35.0 } })).unwrap();
/// assert_eq!(spawned.kind(), "player");
/// ```
#[derive(Debug, Clone)]
pub struct EntityTemplate {
    kind: String,
    components: Vec<(ComponentType, Value)>,
    after_init: Option<fn(&mut Entity)>,
}

impl EntityTemplate {
    /// Creates a template with the given kind label and no components.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            components: Vec::new(),
            after_init: None,
        }
    }

    /// Declares a default component with template-level overrides layered on
    /// the type's schema defaults. `Null` means "schema defaults as-is".
    #[must_use]
    pub fn component(mut self, ty: &ComponentType, defaults: Value) -> Self {
        self.components.push((ty.clone(), defaults));
        self
    }

    /// Registers a hook run on each spawned entity after its components are
    /// built, so callers can extend construction without wrapping the
    /// template.
    #[must_use]
    pub fn after_init(mut self, hook: fn(&mut Entity)) -> Self {
        self.after_init = Some(hook);
        self
    }

    /// The kind label spawned entities will carry.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Spawns an entity with a freshly allocated id.
    ///
    /// `overrides` is a JSON object keyed by component name (canonicalized,
    /// so `"Position"` addresses `"position"`); each value is an attribute
    /// override object merged over the template-level defaults, which in
    /// turn sit over the schema defaults. Unknown component names are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOverrides`] when `overrides` or any
    /// per-component payload is neither `Null` nor an object.
    pub fn spawn(&self, ids: &mut EntityAllocator, overrides: Value) -> Result<Entity> {
        let entity = Entity::new(ids).with_kind(self.kind.clone());
        self.build(entity, overrides)
    }

    /// Spawns an entity with an explicit id (claimed from the allocator).
    ///
    /// # Errors
    ///
    /// Same conditions as [`EntityTemplate::spawn`].
    pub fn spawn_with_id(
        &self,
        ids: &mut EntityAllocator,
        id: u64,
        overrides: Value,
    ) -> Result<Entity> {
        let entity = Entity::with_id(ids, id).with_kind(self.kind.clone());
        self.build(entity, overrides)
    }

    fn build(&self, mut entity: Entity, overrides: Value) -> Result<Entity> {
        let mut by_name: Map<String, Value> = Map::new();
        for (name, value) in into_override_map(overrides, &self.kind)? {
            by_name.insert(canonicalize(&name), value);
        }

        for (ty, defaults) in &self.components {
            let mut merged = into_override_map(defaults.clone(), ty.name())?;
            if let Some(per_component) = by_name.remove(ty.name()) {
                for (name, value) in into_override_map(per_component, ty.name())? {
                    merged.insert(name, value);
                }
            }
            entity
                .components_mut()
                .add(ty.construct(Value::Object(merged))?)?;
        }

        if let Some(hook) = self.after_init {
            hook(&mut entity);
        }
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tag::tag;

    fn make_position() -> ComponentType {
        ComponentType::declare("position")
            .attribute("x", json!(0.0))
            .attribute("y", json!(0.0))
    }

    fn make_player(position: &ComponentType) -> EntityTemplate {
        EntityTemplate::new("player").component(position, json!({ "x": 600.0, "y": 35.0 }))
    }

    #[test]
    fn test_sequential_ids_are_strictly_increasing() {
        let mut ids = EntityAllocator::new();
        let mut last = 0;
        for _ in 0..5 {
            let entity = Entity::new(&mut ids);
            assert!(entity.id().value() > last);
            last = entity.id().value();
        }
    }

    #[test]
    fn test_explicit_id_raises_counter() {
        let mut ids = EntityAllocator::new();
        let first = Entity::new(&mut ids);
        assert_eq!(first.id().value(), 1);

        let explicit = Entity::with_id(&mut ids, 10);
        assert_eq!(explicit.id().value(), 10);
        assert_eq!(ids.next_id(), 11);

        // A low explicit id never lowers the counter.
        let low = Entity::with_id(&mut ids, 3);
        assert_eq!(low.id().value(), 3);
        assert_eq!(Entity::new(&mut ids).id().value(), 11);
    }

    #[test]
    fn test_loud_accessor_reports_missing_component() {
        let mut ids = EntityAllocator::new();
        let entity = Entity::new(&mut ids);
        let err = entity.component(ComponentKey::from_name("position")).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingComponent { component, .. } if component == "position"
        ));
    }

    #[test]
    fn test_template_spawn_merges_override_layers() {
        let position = make_position();
        let player = make_player(&position);
        let mut ids = EntityAllocator::new();

        // Schema says 0/0, template says 600/35, spawn says x=5.
        let spawned = player
            .spawn(&mut ids, json!({ "position": { "x": 5.0 } }))
            .unwrap();
        let component = spawned.component(position.key()).unwrap();
        assert_eq!(component.get("x"), Some(&json!(5.0)));
        assert_eq!(component.get("y"), Some(&json!(35.0)));
        assert_eq!(spawned.kind(), "player");
    }

    #[test]
    fn test_template_spawn_canonicalizes_override_names() {
        let position = make_position();
        let player = make_player(&position);
        let mut ids = EntityAllocator::new();
        let spawned = player
            .spawn(&mut ids, json!({ "Position": { "x": 1.0 } }))
            .unwrap();
        assert_eq!(
            spawned.component(position.key()).unwrap().get("x"),
            Some(&json!(1.0))
        );
    }

    #[test]
    fn test_template_spawn_ignores_unknown_component_names() {
        let position = make_position();
        let player = make_player(&position);
        let mut ids = EntityAllocator::new();
        let spawned = player
            .spawn(&mut ids, json!({ "warp_drive": { "charge": 1 } }))
            .unwrap();
        assert_eq!(spawned.components().len(), 1);
    }

    #[test]
    fn test_template_with_tag_component() {
        let player = EntityTemplate::new("wreck").component(&tag("destroyed"), Value::Null);
        let mut ids = EntityAllocator::new();
        let spawned = player.spawn(&mut ids, Value::Null).unwrap();
        assert!(spawned.has(ComponentKey::from_name("destroyed")));
    }

    #[test]
    fn test_template_after_init_hook_runs() {
        fn rename(entity: &mut Entity) {
            let position = entity
                .component_mut(ComponentKey::from_name("position"))
                .unwrap();
            position.set("x", json!(99.0)).unwrap();
        }

        let position = make_position();
        let template = EntityTemplate::new("probe")
            .component(&position, Value::Null)
            .after_init(rename);
        let mut ids = EntityAllocator::new();
        let spawned = template.spawn(&mut ids, Value::Null).unwrap();
        assert_eq!(
            spawned.component(position.key()).unwrap().get("x"),
            Some(&json!(99.0))
        );
    }

    #[test]
    fn test_spawn_with_explicit_id() {
        let position = make_position();
        let player = make_player(&position);
        let mut ids = EntityAllocator::new();
        let spawned = player.spawn_with_id(&mut ids, 7, Value::Null).unwrap();
        assert_eq!(spawned.id().value(), 7);
        assert_eq!(ids.next_id(), 8);
    }

    #[test]
    fn test_entity_serialize_shape() {
        let position = make_position();
        let player = make_player(&position);
        let mut ids = EntityAllocator::new();
        let spawned = player.spawn_with_id(&mut ids, 1, Value::Null).unwrap();
        assert_eq!(
            spawned.serialize(),
            json!({
                "id": 1,
                "kind": "player",
                "components": {
                    "position": { "type": "position", "x": 600.0, "y": 35.0 },
                },
            })
        );
    }

    #[test]
    fn test_rejects_non_object_entity_overrides() {
        let position = make_position();
        let player = make_player(&position);
        let mut ids = EntityAllocator::new();
        let err = player.spawn(&mut ids, json!([1, 2])).unwrap_err();
        assert!(matches!(err, Error::InvalidOverrides { .. }));
    }
}
