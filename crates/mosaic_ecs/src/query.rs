//! Filters: the terms a system uses to select its entity subset.

use crate::component::ComponentKey;
use crate::entity::EntityId;
use crate::schema::ComponentType;

/// One filter term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryTerm {
    /// The entity must carry an instance of this component type.
    Component(ComponentKey),
    /// The entity must be exactly this one.
    Id(EntityId),
}

impl From<ComponentKey> for QueryTerm {
    fn from(key: ComponentKey) -> Self {
        Self::Component(key)
    }
}

impl From<&ComponentType> for QueryTerm {
    fn from(ty: &ComponentType) -> Self {
        Self::Component(ty.key())
    }
}

impl From<EntityId> for QueryTerm {
    fn from(id: EntityId) -> Self {
        Self::Id(id)
    }
}

/// An ordered list of terms that must all hold for an entity to match.
///
/// Declared once per system type:
///
/// ```rust
/// use mosaic_ecs::{ComponentKey, Filter};
///
/// const POSITION: ComponentKey = ComponentKey::from_name("position");
/// const SPEED: ComponentKey = ComponentKey::from_name("speed");
///
/// let movable = Filter::new().component(POSITION).component(SPEED);
/// assert_eq!(movable.terms().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    terms: Vec<QueryTerm>,
}

impl Filter {
    /// Creates an empty filter. An empty filter matches no entities (see
    /// `EntityStore::query`).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires entities to carry an instance of the given component type.
    #[must_use]
    pub fn component(mut self, key: ComponentKey) -> Self {
        self.terms.push(QueryTerm::Component(key));
        self
    }

    /// Requires entities to be exactly the given one.
    #[must_use]
    pub fn entity(mut self, id: EntityId) -> Self {
        self.terms.push(QueryTerm::Id(id));
        self
    }

    /// Appends an arbitrary term.
    #[must_use]
    pub fn term(mut self, term: impl Into<QueryTerm>) -> Self {
        self.terms.push(term.into());
        self
    }

    /// The terms, in declaration order.
    #[must_use]
    pub fn terms(&self) -> &[QueryTerm] {
        &self.terms
    }

    /// Whether no terms are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}
