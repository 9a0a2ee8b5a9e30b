//! Structural fingerprints for cache keys.
//!
//! A [`Fingerprint`] is a 64-bit FNV-1a hash over the semantic content of a
//! value. Unlike [`std::hash::Hash`] on interned identifiers it depends only
//! on the strings involved, so two equal values produced by different model
//! builds, or in different processes, share the same fingerprint.

use std::fmt;

use crate::identifier::Id;

/// FNV-1a 64-bit offset basis.
const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
/// FNV-1a 64-bit prime.
const FNV_PRIME: u64 = 0x100000001b3;
/// Written between fields so that `("ab", "c")` and `("a", "bc")` differ.
const FIELD_SEPARATOR: u8 = 0xff;

/// Structural hash of a value's semantic content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Returns the raw hash value.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Incremental builder for a [`Fingerprint`].
#[derive(Debug, Clone)]
pub struct FingerprintBuilder {
    hash: u64,
}

impl Default for FingerprintBuilder {
    fn default() -> Self {
        Self {
            hash: FNV_OFFSET_BASIS,
        }
    }
}

impl FingerprintBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.hash ^= u64::from(*byte);
            self.hash = self.hash.wrapping_mul(FNV_PRIME);
        }
    }

    /// Feeds one string field.
    pub fn field(&mut self, value: &str) -> &mut Self {
        self.write_bytes(value.as_bytes());
        self.write_bytes(&[FIELD_SEPARATOR]);
        self
    }

    /// Feeds the string form of an identifier.
    pub fn id(&mut self, id: Id) -> &mut Self {
        id.with_str(|name| {
            self.field(name);
        });
        self
    }

    /// Feeds an optional string field; `None` and `Some("")` hash differently.
    pub fn optional_field(&mut self, value: Option<&str>) -> &mut Self {
        match value {
            Some(value) => {
                self.write_bytes(&[1]);
                self.field(value)
            }
            None => {
                self.write_bytes(&[0]);
                self
            }
        }
    }

    /// Feeds a length prefix for a following run of fields.
    pub fn count(&mut self, count: usize) -> &mut Self {
        self.write_bytes(&(count as u64).to_le_bytes());
        self
    }

    /// Returns the fingerprint of everything fed so far.
    pub fn finish(&self) -> Fingerprint {
        Fingerprint(self.hash)
    }
}
