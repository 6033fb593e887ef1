use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid object id: {0}")]
    InvalidObjectId(String),

    #[error("expected an object of type {expected}, got {actual}")]
    WrongObjectType { expected: String, actual: String },

    #[error("unknown object type {type_id} in space {space}")]
    UnknownType { space: u8, type_id: u8 },
}
