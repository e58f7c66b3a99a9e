//! Error types surfaced by the map and its node allocators.

use thiserror::Error;

/// The map's allocator could not provide storage for more nodes.
#[derive(Copy, Clone, Debug, Error, Eq, PartialEq)]
#[error("node storage exhausted: no room for {nodes} more node(s)")]
pub struct AllocError {
    pub nodes: usize,
}

#[derive(Copy, Clone, Debug, Error, PartialEq)]
pub enum MapError {
    /// `at`/`at_mut` on a key that is not stored.
    #[error("key not found")]
    KeyNotFound,
    #[error(transparent)]
    Alloc(#[from] AllocError),
    /// Max load factor must be finite and strictly positive.
    #[error("invalid max load factor: {0}")]
    InvalidLoadFactor(f64),
    /// Growth factor must be finite and greater than one.
    #[error("invalid growth factor: {0}")]
    InvalidGrowthFactor(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(MapError::KeyNotFound.to_string(), "key not found");
        let e: MapError = AllocError { nodes: 1 }.into();
        assert_eq!(
            e.to_string(),
            "node storage exhausted: no room for 1 more node(s)"
        );
        assert_eq!(
            MapError::InvalidLoadFactor(-1.0).to_string(),
            "invalid max load factor: -1"
        );
    }
}
