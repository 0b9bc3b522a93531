//! graphmap-graph: backend adapters, batched transactions, and the `Graph`
//! facade.
//!
//! Two backends are implemented:
//! - Neo4j over bolt (`neo4rs`)
//! - The Redis-hosted graph module (`redis`)
//!
//! Both implement [`GraphBackend`] on top of a [`QueryDriver`], so the
//! transaction engine and the facade never branch on a concrete backend.

pub mod backend;
pub mod cache;
pub mod driver;
pub mod error;
pub mod graph;
pub mod neo4j;
pub mod redisgraph;
pub mod transaction;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{EdgeGroup, EdgeRow, GraphBackend};
pub use cache::NodeCache;
pub use driver::{Params, QueryDriver, ResultElement, ResultRow};
pub use error::{GraphError, Result};
pub use graph::{BootstrapSummary, Graph};
pub use neo4j::{Neo4jBackend, Neo4jDriver};
pub use redisgraph::{RedisGraphBackend, RedisGraphDriver};
pub use transaction::{CommitSummary, Transaction, TransactionState};
