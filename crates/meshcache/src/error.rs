//! Error types for meshcache

use std::fmt;
use std::sync::Arc;

/// Boxed error returned by loaders and peers
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for meshcache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for group and registry operations
#[derive(Debug, Clone)]
pub enum Error {
    /// Lookup with an empty key
    EmptyKey,

    /// The group's loader failed
    Load(LoadError),

    /// A group with this name is already registered
    DuplicateGroup(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyKey => write!(f, "key is required"),
            Error::Load(e) => write!(f, "{}", e),
            Error::DuplicateGroup(name) => write!(f, "group already registered: {}", name),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Load(e) => Some(e.inner()),
            _ => None,
        }
    }
}

impl From<LoadError> for Error {
    fn from(err: LoadError) -> Self {
        Error::Load(err)
    }
}

/// Loader failure shared by every caller of one coalesced load.
///
/// Displays exactly as the loader's own error did.
#[derive(Debug, Clone)]
pub struct LoadError(Arc<dyn std::error::Error + Send + Sync + 'static>);

impl LoadError {
    /// The loader's original error
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.0
    }

    /// Downcast the loader's error to a concrete type
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    /// Check whether two handles refer to the same loader failure
    pub fn same_failure(&self, other: &LoadError) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<BoxError> for LoadError {
    fn from(err: BoxError) -> Self {
        LoadError(Arc::from(err))
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}
