//! Error types for object and batch access

use dssobj_engine::{InterfaceError, NativeError};

use crate::config::ConfigError;

/// Edit-session state machine violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionMisuse {
    /// `begin_edit` while a session is already open (sessions do not nest)
    #[error("an edit session is already open")]
    AlreadyOpen,

    /// `end_edit` without a matching `begin_edit`
    #[error("no edit session is open")]
    NotOpen,
}

/// Error type for every public operation of this crate
#[derive(Debug, thiserror::Error)]
pub enum DssError {
    /// Object, class or element lookup failed
    #[error("Not found: {0}")]
    NotFound(String),

    /// The handle was invalidated (`clear_all`, `release` or context teardown)
    #[error("Handle is no longer valid")]
    InvalidHandle,

    /// The engine reported a failure through its error slot
    #[error("Native error #{code}: {message}")]
    Native { code: i32, message: String },

    /// A vector argument does not match the batch size
    #[error("Number of elements must match: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Edit-session misuse
    #[error("Edit session misuse: {0}")]
    SessionMisuse(#[from] SessionMisuse),

    /// The engine declined to create an object
    #[error("Could not create object {0}")]
    ConstructionConflict(String),

    /// A value does not fit the declared kind of a property
    #[error("Property {property} is {actual}, cannot take {expected}")]
    KindMismatch {
        property: String,
        expected: String,
        actual: String,
    },

    /// A handle from one context was used against another
    #[error("Handle belongs to a different context")]
    ForeignContext,

    /// A schema was registered for a class index that already has one
    #[error("Class index {0} is already registered")]
    ClassConflict(u32),

    /// Function table missing or invalid
    #[error(transparent)]
    Interface(#[from] InterfaceError),

    /// Configuration could not be loaded or saved
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Values could not be marshalled across the boundary
    #[error("Marshalling failed: {0}")]
    Marshal(NativeError),

    /// Engine JSON output could not be parsed
    #[error("Invalid JSON from engine: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid name filter
    #[error("Invalid name pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl From<NativeError> for DssError {
    fn from(err: NativeError) -> Self {
        match err {
            NativeError::Native { code, message } => DssError::Native { code, message },
            other => DssError::Marshal(other),
        }
    }
}

impl DssError {
    /// Engine error code, if this error came from the error slot
    pub fn native_code(&self) -> Option<i32> {
        match self {
            DssError::Native { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result type for object and batch access
pub type DssResult<T> = Result<T, DssError>;
