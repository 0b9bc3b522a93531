use thiserror::Error;

/// Errors raised while declaring, constructing, or rendering mapped entities.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("Invalid declaration for '{type_name}': {reason}")]
    InvalidDeclaration { type_name: String, reason: String },

    #[error("Entity type '{0}' is already registered with a different declaration")]
    DuplicateType(String),

    #[error("'{type_name}' has no declared attribute '{attribute}'")]
    UnknownAttribute {
        type_name: String,
        attribute: String,
    },

    #[error("'{type_name}' is missing a value for key attribute '{attribute}'")]
    MissingKeyAttribute {
        type_name: String,
        attribute: String,
    },

    #[error("Invalid mapping request: {0}")]
    InvalidMapping(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Backend '{0}' is not implemented")]
    UnimplementedBackend(String),
}

pub type Result<T> = std::result::Result<T, MappingError>;
