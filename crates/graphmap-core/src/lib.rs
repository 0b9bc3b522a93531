//! graphmap-core: entity model and query text for the graphmap mapping layer.
//!
//! This crate holds everything that does not touch the network:
//! - Entity type declarations and the type registry
//! - Node and edge instances with change tracking
//! - Content identities for nodes and edges
//! - Backend capability descriptors
//! - Cypher text generation
//! - Connection URI and settings parsing

pub mod capability;
pub mod config;
pub mod cypher;
pub mod dirty;
pub mod entity;
pub mod error;
pub mod identity;
pub mod schema;
pub mod value;

pub use capability::{BatchRowShape, Capabilities, IndexMode};
pub use config::{BackendKind, ConnectionUri, Settings};
pub use dirty::DirtyMap;
pub use entity::{Edge, Endpoint, Entity, EntityMut, Node, NodeBuilder};
pub use error::{MappingError, Result};
pub use schema::{EntityKind, EntityType, EntityTypeBuilder, Registry, IDENTITY};
pub use value::{Value, ValueKind};
