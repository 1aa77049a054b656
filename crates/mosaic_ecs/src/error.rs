//! Error types used throughout the crate.

use crate::entity::EntityId;

/// Alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when declaring, attaching, or running world data.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A bare component type was passed where a constructed instance was
    /// required.
    #[error(
        "`{type_name}` is a component type, not a component instance; \
         construct one with `ComponentType::construct` first"
    )]
    NotAComponent {
        /// Canonical name of the type that was passed.
        type_name: &'static str,
    },

    /// A loud component accessor was used for a type the entity does not
    /// currently carry.
    #[error("entity {id} has no `{component}` component attached")]
    MissingComponent {
        /// The entity that was asked.
        id: EntityId,
        /// Canonical name of the missing component type.
        component: &'static str,
    },

    /// The requested entity id is not present in the store.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// An entity with the same id is already present in the store.
    #[error("entity id already present: {0}")]
    DuplicateEntity(EntityId),

    /// `Component::set` was called with a name the schema never declared.
    #[error("component `{component}` has no attribute `{attribute}`")]
    UnknownAttribute {
        /// Canonical name of the component type.
        component: &'static str,
        /// The undeclared attribute name.
        attribute: String,
    },

    /// An override payload had the wrong shape (e.g. not a JSON object).
    #[error("invalid overrides for `{component}`: {message}")]
    InvalidOverrides {
        /// Canonical component name, or the entity kind for entity-level
        /// payloads.
        component: String,
        /// What was wrong with the payload.
        message: String,
    },

    /// A system's `tick` returned an error; the step was aborted.
    #[error("system `{system}` failed: {source}")]
    System {
        /// Registered name of the failing system.
        system: String,
        /// The error the system returned.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
