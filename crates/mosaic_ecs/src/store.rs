//! The entity store: owned entities plus the bidirectional type↔entity
//! index.
//!
//! Every structural mutation (entity added/removed, component attached/
//! detached) updates the index in the same call, so queries never rescan
//! component bags. Invariant, after every mutation: an id is in
//! `type_entities[K]` iff `K` is in `entity_types[id]` iff the entity's
//! component bag holds an instance of `K`.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::component::{Component, ComponentKey, IntoComponent};
use crate::entity::{Entity, EntityId};
use crate::error::{Error, Result};
use crate::query::{Filter, QueryTerm};

/// Owns a set of entities and keeps the type↔entity index synchronized
/// with their component bags.
#[derive(Debug, Default)]
pub struct EntityStore {
    entities: HashMap<EntityId, Entity>,
    entity_types: HashMap<EntityId, HashSet<ComponentKey>>,
    type_entities: HashMap<ComponentKey, HashSet<EntityId>>,
}

impl EntityStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of an entity and indexes every component it already
    /// carries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateEntity`] when an entity with the same id is
    /// already stored; the store never silently replaces, since the old
    /// entity's index entries would be left dangling.
    pub fn add(&mut self, entity: Entity) -> Result<EntityId> {
        let id = entity.id();
        if self.entities.contains_key(&id) {
            return Err(Error::DuplicateEntity(id));
        }

        let keys: HashSet<ComponentKey> = entity.components().keys().collect();
        for key in &keys {
            self.type_entities.entry(*key).or_default().insert(id);
        }
        debug!(entity = %id, components = keys.len(), "entity added");
        self.entity_types.insert(id, keys);
        self.entities.insert(id, entity);
        Ok(id)
    }

    /// Removes an entity, unindexes every type it held, and returns the
    /// owned value (components intact).
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntityNotFound`] when `id` is not stored.
    pub fn remove(&mut self, id: EntityId) -> Result<Entity> {
        let entity = self
            .entities
            .remove(&id)
            .ok_or(Error::EntityNotFound(id))?;
        if let Some(keys) = self.entity_types.remove(&id) {
            for key in keys {
                self.unindex(id, key);
            }
        }
        debug!(entity = %id, "entity removed");
        Ok(entity)
    }

    /// Attaches a component to a stored entity and indexes it, returning any
    /// displaced instance of the same type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntityNotFound`] when `id` is not stored, or
    /// [`Error::NotAComponent`] when handed a bare type.
    pub fn add_component(
        &mut self,
        id: EntityId,
        component: impl IntoComponent,
    ) -> Result<Option<Component>> {
        let component = component.into_component()?;
        let key = component.key();
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(Error::EntityNotFound(id))?;
        let displaced = entity.components_mut().add(component)?;
        self.entity_types.entry(id).or_default().insert(key);
        self.type_entities.entry(key).or_default().insert(id);
        trace!(entity = %id, component = %key, "component attached");
        Ok(displaced)
    }

    /// Detaches the component of `key`'s type from a stored entity and
    /// unindexes it. Returns the detached instance, or `None` when the type
    /// was not attached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntityNotFound`] when `id` is not stored.
    pub fn remove_component(
        &mut self,
        id: EntityId,
        key: ComponentKey,
    ) -> Result<Option<Component>> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(Error::EntityNotFound(id))?;
        let removed = entity.components_mut().remove(key);
        if removed.is_some() {
            if let Some(types) = self.entity_types.get_mut(&id) {
                types.remove(&key);
            }
            self.unindex(id, key);
            trace!(entity = %id, component = %key, "component detached");
        }
        Ok(removed)
    }

    fn unindex(&mut self, id: EntityId, key: ComponentKey) {
        let emptied = self.type_entities.get_mut(&key).is_some_and(|set| {
            set.remove(&id);
            set.is_empty()
        });
        if emptied {
            self.type_entities.remove(&key);
        }
    }

    /// The stored entity with this id, if present.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Whether an entity with this id is stored.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// The attached component of `key`'s type on entity `id` (loud form).
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntityNotFound`] or [`Error::MissingComponent`].
    pub fn component(&self, id: EntityId, key: ComponentKey) -> Result<&Component> {
        self.entities
            .get(&id)
            .ok_or(Error::EntityNotFound(id))?
            .component(key)
    }

    /// Mutable form of [`EntityStore::component`]. Attribute values can be
    /// written in place; attaching/detaching still goes through
    /// [`EntityStore::add_component`]/[`EntityStore::remove_component`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntityNotFound`] or [`Error::MissingComponent`].
    pub fn component_mut(&mut self, id: EntityId, key: ComponentKey) -> Result<&mut Component> {
        self.entities
            .get_mut(&id)
            .ok_or(Error::EntityNotFound(id))?
            .component_mut(key)
    }

    /// Quiet component lookup: `None` when the entity or the component is
    /// absent.
    #[must_use]
    pub fn get_component(&self, id: EntityId, key: ComponentKey) -> Option<&Component> {
        self.entities.get(&id).and_then(|entity| entity.get(key))
    }

    /// Whether entity `id` currently carries `key`'s type.
    #[must_use]
    pub fn has_component(&self, id: EntityId, key: ComponentKey) -> bool {
        self.entities
            .get(&id)
            .is_some_and(|entity| entity.has(key))
    }

    /// Number of stored entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether no entities are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterates the stored entity ids (unordered).
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    /// Iterates the stored entities (unordered).
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Resolves each filter term to a candidate set and intersects them.
    ///
    /// A component term resolves through the type index; an id term resolves
    /// to that entity alone (if stored). An **empty filter matches nothing**
    /// — a caller that wants every entity iterates [`EntityStore::ids`]
    /// instead. Results are sorted by id so iteration order is
    /// deterministic.
    #[must_use]
    pub fn query(&self, filter: &Filter) -> Vec<EntityId> {
        let Some((first, rest)) = filter.terms().split_first() else {
            return Vec::new();
        };

        let mut matched: Vec<EntityId> = match first {
            QueryTerm::Component(key) => self
                .type_entities
                .get(key)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default(),
            QueryTerm::Id(id) => {
                if self.entities.contains_key(id) {
                    vec![*id]
                } else {
                    Vec::new()
                }
            }
        };

        for term in rest {
            if matched.is_empty() {
                break;
            }
            match term {
                QueryTerm::Component(key) => match self.type_entities.get(key) {
                    Some(set) => matched.retain(|id| set.contains(id)),
                    None => matched.clear(),
                },
                // Membership in the previous candidates already implies the
                // entity is stored.
                QueryTerm::Id(id) => matched.retain(|candidate| candidate == id),
            }
        }

        matched.sort_unstable();
        matched
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::{Value, json};

    use super::*;
    use crate::entity::EntityAllocator;
    use crate::schema::ComponentType;

    fn make_position() -> ComponentType {
        ComponentType::declare("position")
            .attribute("x", json!(0.0))
            .attribute("y", json!(0.0))
    }

    fn make_speed() -> ComponentType {
        ComponentType::declare("speed").attribute("speed", json!(0.0))
    }

    fn make_entity_with(
        ids: &mut EntityAllocator,
        types: &[&ComponentType],
    ) -> Entity {
        let mut entity = Entity::new(ids);
        for ty in types {
            entity
                .components_mut()
                .add(ty.construct(Value::Null).unwrap())
                .unwrap();
        }
        entity
    }

    #[test]
    fn test_add_indexes_preexisting_components() {
        let position = make_position();
        let speed = make_speed();
        let mut ids = EntityAllocator::new();
        let mut store = EntityStore::new();

        let id = store
            .add(make_entity_with(&mut ids, &[&position, &speed]))
            .unwrap();

        assert_eq!(store.query(&Filter::new().component(position.key())), vec![id]);
        assert_eq!(store.query(&Filter::new().component(speed.key())), vec![id]);
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let mut ids = EntityAllocator::new();
        let mut store = EntityStore::new();
        store.add(Entity::with_id(&mut ids, 7)).unwrap();
        let err = store.add(Entity::with_id(&mut ids, 7)).unwrap_err();
        assert!(matches!(err, Error::DuplicateEntity(EntityId(7))));
    }

    #[test]
    fn test_remove_returns_entity_and_unindexes() {
        let position = make_position();
        let mut ids = EntityAllocator::new();
        let mut store = EntityStore::new();
        let id = store
            .add(make_entity_with(&mut ids, &[&position]))
            .unwrap();

        let entity = store.remove(id).unwrap();
        assert!(entity.has(position.key()));
        assert!(store.is_empty());
        assert!(store.query(&Filter::new().component(position.key())).is_empty());
        assert!(matches!(store.remove(id), Err(Error::EntityNotFound(_))));
    }

    #[test]
    fn test_component_mutations_update_index_immediately() {
        let position = make_position();
        let filter = Filter::new().component(position.key());
        let mut ids = EntityAllocator::new();
        let mut store = EntityStore::new();
        let id = store.add(Entity::new(&mut ids)).unwrap();

        assert!(store.query(&filter).is_empty());

        store
            .add_component(id, position.construct(Value::Null).unwrap())
            .unwrap();
        assert_eq!(store.query(&filter), vec![id]);

        store.remove_component(id, position.key()).unwrap();
        assert!(store.query(&filter).is_empty());
        assert!(!store.has_component(id, position.key()));
    }

    #[test]
    fn test_remove_absent_component_is_quiet() {
        let mut ids = EntityAllocator::new();
        let mut store = EntityStore::new();
        let id = store.add(Entity::new(&mut ids)).unwrap();
        assert!(store.remove_component(id, make_position().key()).unwrap().is_none());
    }

    #[test]
    fn test_query_intersection_law() {
        let position = make_position();
        let speed = make_speed();
        let mut ids = EntityAllocator::new();
        let mut store = EntityStore::new();

        let a = store.add(make_entity_with(&mut ids, &[&position])).unwrap();
        let b = store
            .add(make_entity_with(&mut ids, &[&position, &speed]))
            .unwrap();
        let c = store.add(make_entity_with(&mut ids, &[&speed])).unwrap();

        let both = store.query(&Filter::new().component(position.key()).component(speed.key()));
        assert_eq!(both, vec![b]);

        let only_position = store.query(&Filter::new().component(position.key()));
        let only_speed = store.query(&Filter::new().component(speed.key()));
        let intersection: Vec<EntityId> = only_position
            .iter()
            .copied()
            .filter(|id| only_speed.contains(id))
            .collect();
        assert_eq!(both, intersection);
        assert_eq!(only_position, vec![a, b]);
        assert_eq!(only_speed, vec![b, c]);
    }

    #[test]
    fn test_query_with_id_terms() {
        let position = make_position();
        let mut ids = EntityAllocator::new();
        let mut store = EntityStore::new();
        let a = store.add(make_entity_with(&mut ids, &[&position])).unwrap();
        let b = store.add(make_entity_with(&mut ids, &[&position])).unwrap();

        assert_eq!(
            store.query(&Filter::new().component(position.key()).entity(b)),
            vec![b]
        );
        assert_eq!(store.query(&Filter::new().entity(a)), vec![a]);
        assert!(store.query(&Filter::new().entity(EntityId(999))).is_empty());
    }

    #[test]
    fn test_empty_filter_matches_nothing() {
        let mut ids = EntityAllocator::new();
        let mut store = EntityStore::new();
        store.add(Entity::new(&mut ids)).unwrap();
        assert!(store.query(&Filter::new()).is_empty());
    }

    #[test]
    fn test_query_results_are_sorted_by_id() {
        let position = make_position();
        let mut ids = EntityAllocator::new();
        let mut store = EntityStore::new();
        // Insert out of id order.
        let late = Entity::with_id(&mut ids, 50);
        let early = Entity::with_id(&mut ids, 2);
        for mut entity in [late, early] {
            entity
                .components_mut()
                .add(position.construct(Value::Null).unwrap())
                .unwrap();
            store.add(entity).unwrap();
        }
        assert_eq!(
            store.query(&Filter::new().component(position.key())),
            vec![EntityId(2), EntityId(50)]
        );
    }

    #[test]
    fn test_loud_accessors_report_what_is_missing() {
        let position = make_position();
        let mut ids = EntityAllocator::new();
        let mut store = EntityStore::new();
        let id = store.add(Entity::new(&mut ids)).unwrap();

        assert!(matches!(
            store.component(EntityId(99), position.key()),
            Err(Error::EntityNotFound(EntityId(99)))
        ));
        assert!(matches!(
            store.component(id, position.key()),
            Err(Error::MissingComponent { component: "position", .. })
        ));
        assert!(store.get_component(id, position.key()).is_none());
    }

    proptest! {
        // Interleave attach/detach arbitrarily; the index and the component
        // bags must agree after every operation.
        #[test]
        fn prop_index_agrees_with_component_bags(
            ops in proptest::collection::vec((0usize..2, 0usize..4, 0usize..3), 1..48)
        ) {
            let types = [
                make_position(),
                make_speed(),
                ComponentType::declare("label").attribute("text", Value::Null),
            ];
            let mut ids = EntityAllocator::new();
            let mut store = EntityStore::new();
            let stored: Vec<EntityId> = (0..4)
                .map(|_| store.add(Entity::new(&mut ids)).unwrap())
                .collect();

            for (action, entity_idx, type_idx) in ops {
                let id = stored[entity_idx];
                let ty = &types[type_idx];
                if action == 0 {
                    store.add_component(id, ty.construct(Value::Null).unwrap()).unwrap();
                } else {
                    store.remove_component(id, ty.key()).unwrap();
                }

                for &id in &stored {
                    for ty in &types {
                        let indexed = store
                            .query(&Filter::new().component(ty.key()))
                            .contains(&id);
                        prop_assert_eq!(indexed, store.has_component(id, ty.key()));
                    }
                }
            }
        }
    }
}
