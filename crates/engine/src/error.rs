//! Error types for function table loading and native calls

/// Error type for function table loading operations
#[derive(Debug, thiserror::Error)]
pub enum InterfaceError {
    /// A required function table entry is null
    #[error("Missing required entries: {0}")]
    MissingEntries(String),

    /// Entry point or table pointer was null
    #[error("Null pointer for: {0}")]
    NullPointer(String),

    /// Engine table has a different ABI version than requested
    #[error("Function table version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    /// Function table already installed
    #[error("Function table already initialized")]
    AlreadyInitialized,

    /// No function table installed yet
    #[error("Function table not initialized")]
    NotInitialized,
}

/// Error type for a single call across the native boundary
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NativeError {
    /// The engine's error slot was set after the call
    #[error("Native error #{code}: {message}")]
    Native { code: i32, message: String },

    /// A host string could not be passed as a C string
    #[error("String contains an interior NUL byte: {0:?}")]
    InteriorNul(String),

    /// The engine returned a count that cannot describe a buffer
    #[error("Engine returned an invalid element count: {0}")]
    BadCount(i32),

    /// Optional table entry not provided by this engine build
    #[error("Engine does not provide `{0}`")]
    Unsupported(&'static str),

    /// The engine refused to create a context
    #[error("Engine returned a null context")]
    NullContext,
}

impl NativeError {
    /// Numeric engine error code, if this is a native failure
    pub fn native_code(&self) -> Option<i32> {
        match self {
            NativeError::Native { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result type for native calls
pub type NativeResult<T> = Result<T, NativeError>;
