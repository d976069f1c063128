/// Lightweight error enum, one byte wide.
/// The descriptive message of the last error is kept in `EjsHeap::error_message`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EjsError {
    /// Allocator exhausted, possibly after draining the type pools
    OutOfMemory,
    /// Bad slot index
    OutOfBounds,
    /// Qualified name lookup miss
    NotFound,
    /// Unresolvable reference, e.g. a record that is no longer live
    ReferenceError,
    /// Illegal mutation of a non-dynamic shape, or a value of the wrong kind
    TypeError,
    /// Namespace-agnostic lookup found multiple candidates
    Ambiguous,
}

impl std::fmt::Display for EjsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EjsError::OutOfMemory => write!(f, "Out of Memory"),
            EjsError::OutOfBounds => write!(f, "Out of Bounds"),
            EjsError::NotFound => write!(f, "Not Found"),
            EjsError::ReferenceError => write!(f, "Reference Error"),
            EjsError::TypeError => write!(f, "Type Error"),
            EjsError::Ambiguous => write!(f, "Ambiguous Name"),
        }
    }
}

impl std::error::Error for EjsError {}

pub type EjsResult<T> = Result<T, EjsError>;
