//! # mosaic_ecs
//!
//! A dynamic entity-component-system runtime — components are declared at
//! runtime as named schemas, instantiated into JSON-backed values, and
//! attached to plain entity ids inside a [`World`] that keeps a
//! bidirectional type index current through every mutation and drives
//! registered systems in deterministic steps.
//!
//! This crate provides:
//!
//! - [`ComponentType`] — a runtime-declared component schema with attribute
//!   defaults; [`tag`] memoizes the attribute-less variant.
//! - [`Component`] — one schema-backed instance attached to one entity.
//! - [`Entity`] / [`EntityTemplate`] — owned entity values and declarative
//!   spawn recipes with layered default overrides.
//! - [`EntityStore`] — entity ownership plus the type↔entity index every
//!   [`Filter`] query resolves against.
//! - [`System`] — per-step transient behavior over a snapshot of matched
//!   entities.
//! - [`World`] / [`WorldTemplate`] — the orchestrator: spawn, mutate, query,
//!   and step.
//!
//! ```rust
//! use serde_json::{Value, json};
//! use mosaic_ecs::{ComponentType, EntityTemplate, World};
//!
//! let position = ComponentType::declare("position")
//!     .attribute("x", json!(0.0))
//!     .attribute("y", json!(0.0));
//! let probe = EntityTemplate::new("probe").component(&position, Value::Null);
//!
//! let mut world: World = World::new();
//! let id = world.spawn(&probe, json!({ "position": { "x": 4.0 } })).unwrap();
//! let component = world.component(id, position.key()).unwrap();
//! assert_eq!(component.get("x"), Some(&json!(4.0)));
//! ```

pub mod component;
pub mod entity;
pub mod error;
pub mod query;
pub mod schema;
pub mod store;
pub mod system;
pub mod tag;
pub mod world;

pub use component::{Component, ComponentKey, ComponentStore, IntoComponent, canonicalize};
pub use entity::{Entity, EntityAllocator, EntityId, EntityTemplate};
pub use error::{Error, Result};
pub use query::{Filter, QueryTerm};
pub use schema::{Attribute, AttributeSchema, ComponentType};
pub use store::EntityStore;
pub use system::{PlannedSystem, Step, System, SystemResult};
pub use tag::tag;
pub use world::{NoHooks, SystemRegistration, World, WorldHooks, WorldTemplate};
