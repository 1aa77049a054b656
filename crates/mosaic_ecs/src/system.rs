//! Systems: stateless per-step logic units bound to a filter.

use serde_json::{Value, json};

use crate::entity::EntityId;
use crate::query::Filter;
use crate::world::World;

/// What a system's `tick` returns. Any error aborts the containing step and
/// surfaces to the host wrapped in `Error::System`.
pub type SystemResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// The per-step view handed to a running system.
///
/// `entities` is the snapshot matched by the system's filter when the step
/// was planned; it stays fixed for the whole step even when the system
/// mutates the index, so iteration is stable while later systems (and later
/// steps) observe the mutations.
pub struct Step<'w, C> {
    /// The world, for component access and structural mutation.
    pub world: &'w mut World<C>,
    /// The matched entity ids, in ascending id order.
    pub entities: &'w [EntityId],
}

/// A per-step logic unit.
///
/// A concrete system declares its name and filter once, per type. Each step
/// the world builds a fresh instance via `Default`, runs `before_tick` →
/// `tick` → `after_tick`, and discards it — state that must outlive the
/// step belongs on components or on the host context `C`.
///
/// `before_tick` and `after_tick` default to no-ops; they exist for
/// cross-cutting concerns layered around the actual logic.
pub trait System<C> {
    /// Registered name, used in logs and error reports.
    fn name() -> &'static str
    where
        Self: Sized;

    /// The terms an entity must satisfy to be included in the snapshot.
    fn filter() -> Filter
    where
        Self: Sized;

    /// Runs before `tick`.
    fn before_tick(&mut self, _ctx: &mut C, _step: &mut Step<'_, C>) {}

    /// One unit of logic over the snapshot.
    ///
    /// # Errors
    ///
    /// Returning an error aborts the step; the world wraps it with this
    /// system's name and propagates it to the host.
    fn tick(&mut self, ctx: &mut C, step: &mut Step<'_, C>) -> SystemResult;

    /// Runs after `tick` completed without error.
    fn after_tick(&mut self, _ctx: &mut C, _step: &mut Step<'_, C>) {}
}

/// One planned system execution: the registered name, the snapshot taken in
/// the plan phase, and the transient instance. Handed to world hooks before
/// and after the execute phase.
pub struct PlannedSystem<C> {
    pub(crate) name: &'static str,
    pub(crate) entities: Vec<EntityId>,
    pub(crate) system: Box<dyn System<C>>,
}

impl<C> PlannedSystem<C> {
    pub(crate) fn new(
        name: &'static str,
        entities: Vec<EntityId>,
        system: Box<dyn System<C>>,
    ) -> Self {
        Self {
            name,
            entities,
            system,
        }
    }

    /// The system's registered name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The entity snapshot this execution is bound to.
    #[must_use]
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    /// Serializes to `{ "system": name, "entities": [ids] }`.
    #[must_use]
    pub fn serialize(&self) -> Value {
        let ids: Vec<u64> = self.entities.iter().map(|id| id.value()).collect();
        json!({ "system": self.name, "entities": ids })
    }
}

impl<C> std::fmt::Debug for PlannedSystem<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannedSystem")
            .field("name", &self.name)
            .field("entities", &self.entities)
            .finish_non_exhaustive()
    }
}
