use graphmap_core::MappingError;

/// Errors from backend operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Neo4j query error: {0}")]
    Neo4j(#[from] neo4rs::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Graph element with identity '{identity}' already exists")]
    AlreadyExists { identity: String },

    #[error("Cannot resolve stored element for identity '{identity}'")]
    Unresolvable { identity: String },

    #[error("Transaction is closed")]
    TransactionClosed,

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GraphError {
    /// True when the backend rejected a write because the element exists.
    pub fn is_conflict(&self) -> bool {
        match self {
            GraphError::AlreadyExists { .. } => true,
            GraphError::Neo4j(e) => {
                let message = e.to_string();
                message.contains("ConstraintValidationFailed") || message.contains("already exists")
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
