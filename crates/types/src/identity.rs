//! Producer identity.

use std::fmt;

/// Opaque identity of a block producer.
///
/// A well-formed identity is exactly 64 bytes. The type deliberately does
/// not enforce the length at construction: identities arrive inside block
/// bodies from the network, and malformed ones must survive long enough to
/// be rejected by block validation.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Identity(Vec<u8>);

impl Identity {
    /// Length of a well-formed identity in bytes.
    pub const LENGTH: usize = 64;

    /// Wrap raw identity bytes of any length.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Borrow the underlying bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the identity is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when the identity has the expected length.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == Self::LENGTH
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self(vec![0u8; Self::LENGTH])
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: Vec<u8> = self.0.iter().take(4).copied().collect();
        write!(f, "Identity({}.., {} bytes)", hex::encode(prefix), self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_well_formed() {
        let identity = Identity::default();
        assert_eq!(identity.len(), Identity::LENGTH);
        assert!(identity.is_well_formed());
    }

    #[test]
    fn test_short_identity_is_malformed() {
        let identity = Identity::from_bytes(vec![1, 2, 3]);
        assert!(!identity.is_well_formed());
        assert_eq!(identity.len(), 3);
    }

    #[test]
    fn test_roundtrip_bytes() {
        let bytes = vec![7u8; Identity::LENGTH];
        let identity = Identity::from_bytes(bytes.clone());
        assert_eq!(identity.as_bytes(), bytes.as_slice());
    }
}
