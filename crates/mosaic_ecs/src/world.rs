//! The world: entity ownership, system registrations, and the step driver.

use std::collections::HashMap;

use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::component::{Component, ComponentKey, IntoComponent};
use crate::entity::{Entity, EntityAllocator, EntityId, EntityTemplate};
use crate::error::{Error, Result};
use crate::query::Filter;
use crate::store::EntityStore;
use crate::system::{PlannedSystem, Step, System};

/// Observation and extension points on a world.
///
/// A world carries exactly one hook object. The step hooks bracket the
/// execute phase; the component hooks fire for every attach/detach the world
/// performs, including those triggered by systems mid-step and the
/// synthetic `component_added` events for components an entity already
/// carried when it was added.
pub trait WorldHooks<C> {
    /// Observes the plan (every system's snapshot) before any system runs.
    fn before_step(&mut self, _ctx: &mut C, _plan: &[PlannedSystem<C>]) {}

    /// Receives the completed instances once the execute phase finished.
    fn after_step(&mut self, _ctx: &mut C, _plan: &[PlannedSystem<C>]) {}

    /// May transform or veto a component about to be attached. Returning
    /// `None` drops the attach; the store and index stay untouched.
    fn before_component_added(
        &mut self,
        _id: EntityId,
        component: Component,
    ) -> Option<Component> {
        Some(component)
    }

    /// Observes a component that was attached and indexed.
    fn component_added(&mut self, _id: EntityId, _component: &Component) {}

    /// May veto a detach by returning `false`.
    fn before_component_removed(&mut self, _id: EntityId, _key: ComponentKey) -> bool {
        true
    }

    /// Observes a component that was detached and unindexed.
    fn component_removed(&mut self, _id: EntityId, _component: &Component) {}
}

/// The default hook object: observes nothing, vetoes nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl<C> WorldHooks<C> for NoHooks {}

/// A registered system type: its name, its filter, and a builder for the
/// per-step transient instances.
pub struct SystemRegistration<C> {
    name: &'static str,
    filter: Filter,
    build: fn() -> Box<dyn System<C>>,
}

impl<C> SystemRegistration<C> {
    /// Captures a system type's static declaration.
    #[must_use]
    pub fn of<S>() -> Self
    where
        S: System<C> + Default + 'static,
    {
        Self {
            name: S::name(),
            filter: S::filter(),
            build: || Box::new(S::default()),
        }
    }

    /// The registered name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The filter instances the snapshot is computed from.
    #[must_use]
    pub fn filter(&self) -> &Filter {
        &self.filter
    }
}

impl<C> Clone for SystemRegistration<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            filter: self.filter.clone(),
            build: self.build,
        }
    }
}

impl<C> std::fmt::Debug for SystemRegistration<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemRegistration")
            .field("name", &self.name)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

/// The container orchestrating entities, systems, and the type index.
///
/// `C` is the host's per-step context type, passed through to every system
/// untouched; a world that needs no context uses the default `()`.
///
/// One call to [`World::step`] is one simulation step: snapshot every
/// registered system's matched entities, then run the systems in
/// registration order. Structural changes a system makes are indexed
/// immediately — later queries see them — while each system's own snapshot
/// stays fixed for the step.
pub struct World<C = ()> {
    ids: EntityAllocator,
    store: EntityStore,
    systems: Vec<SystemRegistration<C>>,
    names: HashMap<String, EntityId>,
    hooks: Box<dyn WorldHooks<C>>,
    ticks: u64,
}

impl<C> Default for World<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> World<C> {
    /// Creates an empty world with no systems and the default hooks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ids: EntityAllocator::new(),
            store: EntityStore::new(),
            systems: Vec::new(),
            names: HashMap::new(),
            hooks: Box::new(NoHooks),
            ticks: 0,
        }
    }

    /// Replaces the hook object.
    pub fn set_hooks(&mut self, hooks: Box<dyn WorldHooks<C>>) {
        self.hooks = hooks;
    }

    /// The world's id allocator, for constructing standalone entities that
    /// will later be added to this world.
    pub fn ids_mut(&mut self) -> &mut EntityAllocator {
        &mut self.ids
    }

    /// Number of completed steps.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    // ---- entities ----

    /// Spawns an entity from a template with a freshly allocated id and adds
    /// it to the world.
    ///
    /// # Errors
    ///
    /// Propagates template override errors and (for explicit-id templates
    /// elsewhere) duplicate-id rejection.
    pub fn spawn(&mut self, template: &EntityTemplate, overrides: Value) -> Result<EntityId> {
        let entity = template.spawn(&mut self.ids, overrides)?;
        self.add_entity(entity)
    }

    /// Adds an empty entity with a freshly allocated id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateEntity`] only if a previously added entity
    /// already claimed the id, which cannot happen when all ids come from
    /// this world's allocator.
    pub fn spawn_empty(&mut self) -> Result<EntityId> {
        let entity = Entity::new(&mut self.ids);
        self.add_entity(entity)
    }

    /// Takes ownership of a pre-built entity, indexes it, and fires
    /// `component_added` for every component it already carries. The
    /// entity's id is claimed from this world's allocator so later spawns
    /// cannot collide with it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateEntity`] when the id is already present.
    pub fn add_entity(&mut self, entity: Entity) -> Result<EntityId> {
        let id = self.store.add(entity)?;
        self.ids.claim(id.value());

        let keys: Vec<ComponentKey> = self
            .store
            .entity(id)
            .map(|entity| entity.components().keys().collect())
            .unwrap_or_default();
        let Self { store, hooks, .. } = self;
        for key in keys {
            if let Some(component) = store.get_component(id, key) {
                hooks.component_added(id, component);
            }
        }
        Ok(id)
    }

    /// Removes an entity and returns the owned value, components intact.
    /// The entity stops matching every filter immediately; its id is never
    /// reused.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntityNotFound`] when `id` is not present.
    pub fn remove_entity(&mut self, id: EntityId) -> Result<Entity> {
        self.store.remove(id)
    }

    /// The stored entity with this id, if present.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.store.entity(id)
    }

    /// Whether an entity with this id is stored.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.store.contains(id)
    }

    /// Number of stored entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether no entities are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Iterates the stored entity ids (unordered).
    pub fn entity_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.store.ids()
    }

    /// Iterates the stored entities (unordered).
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.store.iter()
    }

    /// The id registered under a template name, while that entity is still
    /// present.
    #[must_use]
    pub fn named(&self, name: &str) -> Option<EntityId> {
        self.names
            .get(name)
            .copied()
            .filter(|id| self.store.contains(*id))
    }

    /// The named entity itself, while still present.
    #[must_use]
    pub fn named_entity(&self, name: &str) -> Option<&Entity> {
        self.named(name).and_then(|id| self.store.entity(id))
    }

    // ---- components ----

    /// Attaches a component to a stored entity, letting the hook object
    /// transform or veto it first. Returns the displaced instance when one
    /// of the same type was already attached; a vetoed attach returns
    /// `Ok(None)` and leaves the entity untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntityNotFound`] or [`Error::NotAComponent`].
    pub fn add_component(
        &mut self,
        id: EntityId,
        component: impl IntoComponent,
    ) -> Result<Option<Component>> {
        let component = component.into_component()?;
        if !self.store.contains(id) {
            return Err(Error::EntityNotFound(id));
        }
        let Some(component) = self.hooks.before_component_added(id, component) else {
            debug!(entity = %id, "component attach vetoed");
            return Ok(None);
        };
        let key = component.key();
        let displaced = self.store.add_component(id, component)?;

        let Self { store, hooks, .. } = self;
        if let Some(added) = store.get_component(id, key) {
            hooks.component_added(id, added);
        }
        Ok(displaced)
    }

    /// Detaches the component of `key`'s type, letting the hook object veto
    /// first. Returns the detached instance; `Ok(None)` when the type was
    /// not attached or the detach was vetoed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntityNotFound`] when `id` is not present.
    pub fn remove_component(
        &mut self,
        id: EntityId,
        key: ComponentKey,
    ) -> Result<Option<Component>> {
        if !self.store.contains(id) {
            return Err(Error::EntityNotFound(id));
        }
        if !self.hooks.before_component_removed(id, key) {
            debug!(entity = %id, component = %key, "component detach vetoed");
            return Ok(None);
        }
        let removed = self.store.remove_component(id, key)?;
        if let Some(component) = &removed {
            self.hooks.component_removed(id, component);
        }
        Ok(removed)
    }

    /// Loud component accessor; see `EntityStore::component`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntityNotFound`] or [`Error::MissingComponent`].
    pub fn component(&self, id: EntityId, key: ComponentKey) -> Result<&Component> {
        self.store.component(id, key)
    }

    /// Mutable loud accessor for in-place attribute writes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntityNotFound`] or [`Error::MissingComponent`].
    pub fn component_mut(&mut self, id: EntityId, key: ComponentKey) -> Result<&mut Component> {
        self.store.component_mut(id, key)
    }

    /// Quiet component lookup.
    #[must_use]
    pub fn get_component(&self, id: EntityId, key: ComponentKey) -> Option<&Component> {
        self.store.get_component(id, key)
    }

    /// Whether entity `id` currently carries `key`'s type.
    #[must_use]
    pub fn has_component(&self, id: EntityId, key: ComponentKey) -> bool {
        self.store.has_component(id, key)
    }

    /// Resolves a filter against the index; see `EntityStore::query`.
    #[must_use]
    pub fn query(&self, filter: &Filter) -> Vec<EntityId> {
        self.store.query(filter)
    }

    // ---- systems ----

    /// Registers a system type at the end of the execution order. Takes
    /// effect at the next step's plan phase.
    pub fn register<S>(&mut self)
    where
        S: System<C> + Default + 'static,
    {
        let registration = SystemRegistration::of::<S>();
        debug!(system = registration.name, "system registered");
        self.systems.push(registration);
    }

    /// Removes a system registration by name. Returns whether one was
    /// removed.
    pub fn remove_system(&mut self, name: &str) -> bool {
        let before = self.systems.len();
        self.systems.retain(|registration| registration.name != name);
        self.systems.len() != before
    }

    /// The registered system names, in execution order.
    pub fn system_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.systems.iter().map(|registration| registration.name)
    }

    // ---- stepping ----

    /// Runs one simulation step.
    ///
    /// Plan phase: for every registration, in order, snapshot the matching
    /// entities and build a fresh instance; the hook object observes the
    /// whole plan. Execute phase: run each instance's `before_tick` →
    /// `tick` → `after_tick`. Report phase: the hook object receives the
    /// completed instances.
    ///
    /// # Errors
    ///
    /// A system error aborts the step immediately — remaining systems do
    /// not run — and is returned wrapped as [`Error::System`]. The world
    /// keeps whatever mutations had already been applied; recovery is the
    /// host's call.
    pub fn step(&mut self, ctx: &mut C) -> Result<()> {
        self.ticks += 1;
        let tick = self.ticks;

        let mut plan: Vec<PlannedSystem<C>> = self
            .systems
            .iter()
            .map(|registration| {
                PlannedSystem::new(
                    registration.name,
                    self.store.query(&registration.filter),
                    (registration.build)(),
                )
            })
            .collect();
        debug!(tick, systems = plan.len(), "step planned");

        self.hooks.before_step(ctx, &plan);

        for planned in &mut plan {
            let name = planned.name;
            trace!(tick, system = name, matched = planned.entities.len(), "system tick");
            let mut step = Step {
                world: &mut *self,
                entities: &planned.entities,
            };
            planned.system.before_tick(ctx, &mut step);
            planned
                .system
                .tick(ctx, &mut step)
                .map_err(|source| Error::System {
                    system: name.to_owned(),
                    source,
                })?;
            planned.system.after_tick(ctx, &mut step);
        }

        self.hooks.after_step(ctx, &plan);
        debug!(tick, "step complete");
        Ok(())
    }

    /// Serializes to `{ "entities": [..], "systems": [names] }` with
    /// entities in ascending id order and systems in execution order.
    #[must_use]
    pub fn serialize(&self) -> Value {
        let mut ids: Vec<EntityId> = self.store.ids().collect();
        ids.sort_unstable();
        let entities: Vec<Value> = ids
            .iter()
            .filter_map(|id| self.store.entity(*id))
            .map(Entity::serialize)
            .collect();
        let systems: Vec<&str> = self.system_names().collect();
        json!({ "entities": entities, "systems": systems })
    }
}

impl<C> std::fmt::Debug for World<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.store.len())
            .field("systems", &self.systems)
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

/// Declarative world defaults: entity specs (template + overrides +
/// optional name) and an ordered system list. `build` instantiates the
/// defaults in declaration order before the caller adds anything else.
///
/// ```rust
/// use serde_json::{Value, json};
/// use mosaic_ecs::{ComponentType, EntityTemplate, WorldTemplate};
///
/// let countdown = ComponentType::declare("countdown").attribute("remaining", json!(1200));
/// let planet = EntityTemplate::new("planet").component(&countdown, Value::Null);
///
/// let template: WorldTemplate = WorldTemplate::new().entity_named(&planet, Value::Null, "planet");
/// let world = template.build().unwrap();
/// assert!(world.named("planet").is_some());
/// ```
pub struct WorldTemplate<C = ()> {
    entities: Vec<TemplateEntity>,
    systems: Vec<SystemRegistration<C>>,
}

struct TemplateEntity {
    template: EntityTemplate,
    overrides: Value,
    name: Option<String>,
}

impl<C> Default for WorldTemplate<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> WorldTemplate<C> {
    /// Creates an empty world template.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            systems: Vec::new(),
        }
    }

    /// Declares a default entity.
    #[must_use]
    pub fn entity(mut self, template: &EntityTemplate, overrides: Value) -> Self {
        self.entities.push(TemplateEntity {
            template: template.clone(),
            overrides,
            name: None,
        });
        self
    }

    /// Declares a default entity readable via [`World::named`].
    #[must_use]
    pub fn entity_named(
        mut self,
        template: &EntityTemplate,
        overrides: Value,
        name: impl Into<String>,
    ) -> Self {
        self.entities.push(TemplateEntity {
            template: template.clone(),
            overrides,
            name: Some(name.into()),
        });
        self
    }

    /// Appends a system type to the execution order.
    #[must_use]
    pub fn system<S>(mut self) -> Self
    where
        S: System<C> + Default + 'static,
    {
        self.systems.push(SystemRegistration::of::<S>());
        self
    }

    /// Builds a world populated with the declared defaults. The template
    /// stays reusable; every build produces an independent world with fresh
    /// ids.
    ///
    /// # Errors
    ///
    /// Propagates entity template errors.
    pub fn build(&self) -> Result<World<C>> {
        let mut world = World::new();
        for decl in &self.entities {
            let id = world.spawn(&decl.template, decl.overrides.clone())?;
            if let Some(name) = &decl.name {
                world.names.insert(name.clone(), id);
            }
        }
        world.systems = self.systems.clone();
        Ok(world)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::schema::ComponentType;
    use crate::system::SystemResult;
    use crate::tag::tag;

    const POSITION: ComponentKey = ComponentKey::from_name("position");
    const SPEED: ComponentKey = ComponentKey::from_name("speed");
    const MARKED: ComponentKey = ComponentKey::from_name("marked");
    const HOT: ComponentKey = ComponentKey::from_name("hot");

    fn make_position() -> ComponentType {
        ComponentType::declare("position")
            .attribute("x", json!(0.0))
            .attribute("y", json!(0.0))
    }

    fn make_speed() -> ComponentType {
        ComponentType::declare("speed").attribute("speed", json!(0.0))
    }

    #[derive(Debug, Default)]
    struct TestCtx {
        order: Vec<&'static str>,
        snapshot_sizes: Vec<usize>,
        live_matches: Vec<usize>,
    }

    #[derive(Default)]
    struct Movement;

    impl System<TestCtx> for Movement {
        fn name() -> &'static str {
            "movement"
        }

        fn filter() -> Filter {
            Filter::new().component(POSITION).component(SPEED)
        }

        fn tick(&mut self, ctx: &mut TestCtx, step: &mut Step<'_, TestCtx>) -> SystemResult {
            ctx.order.push(Self::name());
            for &id in step.entities {
                let speed = step
                    .world
                    .component(id, SPEED)?
                    .get("speed")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0);
                let position = step.world.component_mut(id, POSITION)?;
                let x = position.get("x").and_then(Value::as_f64).unwrap_or(0.0);
                position.set("x", json!(x + speed))?;
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Cull;

    impl System<TestCtx> for Cull {
        fn name() -> &'static str {
            "cull"
        }

        fn filter() -> Filter {
            Filter::new().component(MARKED)
        }

        fn tick(&mut self, ctx: &mut TestCtx, step: &mut Step<'_, TestCtx>) -> SystemResult {
            ctx.order.push(Self::name());
            ctx.snapshot_sizes.push(step.entities.len());
            if let Some(&first) = step.entities.first() {
                step.world.remove_component(first, MARKED)?;
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Igniter;

    impl System<TestCtx> for Igniter {
        fn name() -> &'static str {
            "igniter"
        }

        fn filter() -> Filter {
            Filter::new().component(POSITION)
        }

        fn tick(&mut self, ctx: &mut TestCtx, step: &mut Step<'_, TestCtx>) -> SystemResult {
            ctx.order.push(Self::name());
            for &id in step.entities {
                if !step.world.has_component(id, HOT) {
                    step.world
                        .add_component(id, tag("hot").construct(Value::Null)?)?;
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct HotWatcher;

    impl System<TestCtx> for HotWatcher {
        fn name() -> &'static str {
            "hot_watcher"
        }

        fn filter() -> Filter {
            Filter::new().component(HOT)
        }

        fn tick(&mut self, ctx: &mut TestCtx, step: &mut Step<'_, TestCtx>) -> SystemResult {
            ctx.order.push(Self::name());
            ctx.snapshot_sizes.push(step.entities.len());
            ctx.live_matches
                .push(step.world.query(&Self::filter()).len());
            Ok(())
        }
    }

    #[derive(Default)]
    struct Faulty;

    impl System<TestCtx> for Faulty {
        fn name() -> &'static str {
            "faulty"
        }

        fn filter() -> Filter {
            Filter::new()
        }

        fn tick(&mut self, _ctx: &mut TestCtx, step: &mut Step<'_, TestCtx>) -> SystemResult {
            // Trip a real error path: loud accessor on a missing entity.
            step.world.component(EntityId(4096), POSITION)?;
            Ok(())
        }
    }

    fn make_moving_world() -> (World<TestCtx>, EntityId) {
        let position = make_position();
        let speed = make_speed();
        let mover = EntityTemplate::new("mover")
            .component(&position, Value::Null)
            .component(&speed, json!({ "speed": 2.0 }));
        let mut world: World<TestCtx> = World::new();
        let id = world.spawn(&mover, Value::Null).unwrap();
        (world, id)
    }

    #[test]
    fn test_step_on_empty_world_is_a_noop() {
        let mut world: World = World::new();
        world.step(&mut ()).unwrap();
        assert_eq!(world.ticks(), 1);
        assert!(world.is_empty());
        assert_eq!(world.serialize(), json!({ "entities": [], "systems": [] }));
    }

    #[test]
    fn test_systems_run_in_registration_order() {
        let (mut world, _) = make_moving_world();
        world.register::<Cull>();
        world.register::<Movement>();
        world.register::<Igniter>();

        let mut ctx = TestCtx::default();
        world.step(&mut ctx).unwrap();
        assert_eq!(ctx.order, vec!["cull", "movement", "igniter"]);
    }

    #[test]
    fn test_system_mutates_components_in_place() {
        let (mut world, id) = make_moving_world();
        world.register::<Movement>();

        let mut ctx = TestCtx::default();
        world.step(&mut ctx).unwrap();
        world.step(&mut ctx).unwrap();

        let position = world.component(id, POSITION).unwrap();
        assert_eq!(position.get("x"), Some(&json!(4.0)));
    }

    #[test]
    fn test_snapshot_stays_fixed_while_index_updates() {
        let marked = tag("marked");
        let mut world: World<TestCtx> = World::new();
        for _ in 0..3 {
            let id = world.spawn_empty().unwrap();
            world
                .add_component(id, marked.construct(Value::Null).unwrap())
                .unwrap();
        }
        world.register::<Cull>();

        let mut ctx = TestCtx::default();
        world.step(&mut ctx).unwrap();
        // The snapshot saw all three even though one lost the component
        // mid-tick, and the very next query reflects the removal.
        assert_eq!(ctx.snapshot_sizes, vec![3]);
        assert_eq!(world.query(&Filter::new().component(MARKED)).len(), 2);

        world.step(&mut ctx).unwrap();
        assert_eq!(ctx.snapshot_sizes, vec![3, 2]);
    }

    #[test]
    fn test_mid_step_mutations_visible_to_later_queries_not_snapshots() {
        let position = make_position();
        let mut world: World<TestCtx> = World::new();
        let id = world.spawn_empty().unwrap();
        world
            .add_component(id, position.construct(Value::Null).unwrap())
            .unwrap();
        world.register::<Igniter>();
        world.register::<HotWatcher>();

        let mut ctx = TestCtx::default();
        world.step(&mut ctx).unwrap();
        // Planned before Igniter ran: empty snapshot. Queried during the
        // same step: the tag is there.
        assert_eq!(ctx.snapshot_sizes, vec![0]);
        assert_eq!(ctx.live_matches, vec![1]);

        world.step(&mut ctx).unwrap();
        assert_eq!(ctx.snapshot_sizes, vec![0, 1]);
    }

    #[test]
    fn test_system_error_aborts_the_step() {
        let (mut world, _) = make_moving_world();
        world.register::<Faulty>();
        world.register::<Movement>();

        let mut ctx = TestCtx::default();
        let err = world.step(&mut ctx).unwrap_err();
        assert!(matches!(&err, Error::System { system, .. } if system == "faulty"));
        assert!(err.to_string().contains("faulty"));
        // Movement never ran.
        assert!(ctx.order.is_empty());
    }

    #[test]
    fn test_remove_system_by_name() {
        let (mut world, _) = make_moving_world();
        world.register::<Movement>();
        assert!(world.remove_system("movement"));
        assert!(!world.remove_system("movement"));
        assert_eq!(world.system_names().count(), 0);
    }

    #[derive(Default)]
    struct RecordingHooks {
        log: Rc<RefCell<Vec<String>>>,
        veto_adds: bool,
        veto_removes: bool,
    }

    impl WorldHooks<TestCtx> for RecordingHooks {
        fn before_step(&mut self, _ctx: &mut TestCtx, plan: &[PlannedSystem<TestCtx>]) {
            self.log.borrow_mut().push(format!("before_step:{}", plan.len()));
        }

        fn after_step(&mut self, _ctx: &mut TestCtx, plan: &[PlannedSystem<TestCtx>]) {
            self.log.borrow_mut().push(format!("after_step:{}", plan.len()));
        }

        fn before_component_added(
            &mut self,
            _id: EntityId,
            component: Component,
        ) -> Option<Component> {
            if self.veto_adds {
                None
            } else {
                Some(component)
            }
        }

        fn component_added(&mut self, id: EntityId, component: &Component) {
            self.log
                .borrow_mut()
                .push(format!("added:{}:{}", id, component.type_name()));
        }

        fn before_component_removed(&mut self, _id: EntityId, _key: ComponentKey) -> bool {
            !self.veto_removes
        }

        fn component_removed(&mut self, id: EntityId, component: &Component) {
            self.log
                .borrow_mut()
                .push(format!("removed:{}:{}", id, component.type_name()));
        }
    }

    #[test]
    fn test_hooks_observe_structural_changes() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut world: World<TestCtx> = World::new();
        world.set_hooks(Box::new(RecordingHooks {
            log: Rc::clone(&log),
            ..RecordingHooks::default()
        }));

        let position = make_position();
        // Pre-built entity: synthetic added events fire on add_entity.
        let mut entity = Entity::new(world.ids_mut());
        entity
            .components_mut()
            .add(position.construct(Value::Null).unwrap())
            .unwrap();
        let id = world.add_entity(entity).unwrap();

        world.remove_component(id, POSITION).unwrap();
        world
            .add_component(id, position.construct(Value::Null).unwrap())
            .unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                format!("added:{id}:position"),
                format!("removed:{id}:position"),
                format!("added:{id}:position"),
            ]
        );
    }

    #[test]
    fn test_hooks_bracket_the_step() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (mut world, _) = make_moving_world();
        world.set_hooks(Box::new(RecordingHooks {
            log: Rc::clone(&log),
            ..RecordingHooks::default()
        }));
        world.register::<Movement>();

        let mut ctx = TestCtx::default();
        world.step(&mut ctx).unwrap();
        assert_eq!(*log.borrow(), vec!["before_step:1", "after_step:1"]);
    }

    #[test]
    fn test_vetoed_attach_leaves_store_and_index_untouched() {
        let mut world: World<TestCtx> = World::new();
        world.set_hooks(Box::new(RecordingHooks {
            veto_adds: true,
            ..RecordingHooks::default()
        }));
        let id = world.spawn_empty().unwrap();

        let outcome = world
            .add_component(id, make_position().construct(Value::Null).unwrap())
            .unwrap();
        assert!(outcome.is_none());
        assert!(!world.has_component(id, POSITION));
        assert!(world.query(&Filter::new().component(POSITION)).is_empty());
    }

    #[test]
    fn test_vetoed_detach_keeps_the_component() {
        let mut world: World<TestCtx> = World::new();
        let id = world.spawn_empty().unwrap();
        world
            .add_component(id, make_position().construct(Value::Null).unwrap())
            .unwrap();
        world.set_hooks(Box::new(RecordingHooks {
            veto_removes: true,
            ..RecordingHooks::default()
        }));

        assert!(world.remove_component(id, POSITION).unwrap().is_none());
        assert!(world.has_component(id, POSITION));
    }

    #[test]
    fn test_world_template_builds_defaults_in_order() {
        let position = make_position();
        let speed = make_speed();
        let mover = EntityTemplate::new("mover")
            .component(&position, Value::Null)
            .component(&speed, json!({ "speed": 1.5 }));
        let beacon = EntityTemplate::new("beacon").component(&position, json!({ "x": 9.0 }));

        let template: WorldTemplate<TestCtx> = WorldTemplate::new()
            .entity(&mover, Value::Null)
            .entity_named(&beacon, Value::Null, "beacon")
            .system::<Movement>()
            .system::<Igniter>();

        let world = template.build().unwrap();
        assert_eq!(world.len(), 2);
        assert_eq!(
            world.system_names().collect::<Vec<_>>(),
            vec!["movement", "igniter"]
        );

        let beacon_id = world.named("beacon").unwrap();
        assert_eq!(
            world
                .component(beacon_id, POSITION)
                .unwrap()
                .get("x"),
            Some(&json!(9.0))
        );
        // Templates are reusable and produce independent worlds.
        assert_eq!(template.build().unwrap().len(), 2);
    }

    #[test]
    fn test_named_accessor_goes_quiet_after_removal() {
        let position = make_position();
        let beacon = EntityTemplate::new("beacon").component(&position, Value::Null);
        let template: WorldTemplate<TestCtx> =
            WorldTemplate::new().entity_named(&beacon, Value::Null, "beacon");
        let mut world = template.build().unwrap();

        let id = world.named("beacon").unwrap();
        let removed = world.remove_entity(id).unwrap();
        assert!(removed.has(POSITION));
        assert!(world.named("beacon").is_none());
        assert!(world.named_entity("beacon").is_none());
    }

    #[test]
    fn test_add_entity_claims_external_ids() {
        let mut external = EntityAllocator::new();
        let foreign = Entity::with_id(&mut external, 100);

        let mut world: World = World::new();
        world.add_entity(foreign).unwrap();
        // The world's own allocator now allocates past the claimed id.
        assert_eq!(world.spawn_empty().unwrap(), EntityId(101));
    }

    #[test]
    fn test_component_ops_on_missing_entity_fail() {
        let mut world: World = World::new();
        let ghost = EntityId(41);
        assert!(matches!(
            world.add_component(ghost, make_position().construct(Value::Null).unwrap()),
            Err(Error::EntityNotFound(EntityId(41)))
        ));
        assert!(matches!(
            world.remove_component(ghost, POSITION),
            Err(Error::EntityNotFound(EntityId(41)))
        ));
    }

    #[test]
    fn test_world_serialize_shape() {
        let position = make_position();
        let mover = EntityTemplate::new("mover").component(&position, json!({ "x": 1.0 }));
        let template: WorldTemplate<TestCtx> = WorldTemplate::new()
            .entity(&mover, Value::Null)
            .system::<Movement>();
        let world = template.build().unwrap();

        assert_eq!(
            world.serialize(),
            json!({
                "entities": [{
                    "id": 1,
                    "kind": "mover",
                    "components": {
                        "position": { "type": "position", "x": 1.0, "y": 0.0 },
                    },
                }],
                "systems": ["movement"],
            })
        );
    }
}
