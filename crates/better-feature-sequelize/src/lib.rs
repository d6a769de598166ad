//! Sequelize-style adapter for better-feature.
//!
//! [`Sequelize`] and [`SequelizeModel`] describe the ORM surface the adapter
//! needs. [`ModelRegistry`] is an in-process implementation used for
//! development and tests; applications can implement the traits over any
//! model layer.

pub mod adapter;
pub mod model;
pub mod registry;

pub use adapter::{sequelize_adapter, SequelizeAdapter, SequelizeAdapterConfig};
pub use model::{FindOptions, ModelInstance, Sequelize, SequelizeError, SequelizeModel};
pub use registry::{AttributeDefinition, MemoryModel, ModelAttributes, ModelRegistry};
