//! Identifier management using string interning.
//!
//! Element, relation, and view identifiers are compared and hashed constantly
//! while models are diffed and caches are looked up, so they are interned once
//! and passed around as a [`Copy`] symbol.

use std::{
    fmt,
    sync::{Mutex, OnceLock},
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use string_interner::{DefaultStringInterner, DefaultSymbol};

/// Global string interner shared by every [`Id`].
static INTERNER: OnceLock<Mutex<DefaultStringInterner>> = OnceLock::new();

fn with_interner<R>(f: impl FnOnce(&mut DefaultStringInterner) -> R) -> R {
    let mut interner = INTERNER
        .get_or_init(|| Mutex::new(DefaultStringInterner::new()))
        .lock()
        .expect("Failed to acquire interner lock");
    f(&mut interner)
}

/// Interned identifier of a model element, relation, or view.
///
/// # Examples
///
/// ```
/// use viewsync_core::identifier::Id;
///
/// let index = Id::new("index");
/// assert_eq!(index, Id::new("index"));
/// assert_eq!(index, "index");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id(DefaultSymbol);

/// Identifier of a model element.
pub type ElementId = Id;

/// Identifier of a model relation.
pub type RelationId = Id;

/// Identifier of a view.
pub type ViewId = Id;

impl Id {
    /// Creates an `Id` from a string slice.
    pub fn new(name: &str) -> Self {
        Self(with_interner(|interner| interner.get_or_intern(name)))
    }

    /// Calls `f` with the string this identifier was interned from.
    pub fn with_str<R>(&self, f: impl FnOnce(&str) -> R) -> R {
        with_interner(|interner| {
            let name = interner
                .resolve(self.0)
                .expect("Symbol should exist in interner");
            f(name)
        })
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.with_str(str::to_owned);
        f.write_str(&name)
    }
}

impl std::str::FromStr for Id {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for Id {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl PartialEq<str> for Id {
    fn eq(&self, other: &str) -> bool {
        self.with_str(|name| name == other)
    }
}

impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.with_str(|name| serializer.serialize_str(name))
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::new(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_new() {
        let id1 = Id::new("cloud");
        let id2 = Id::new("cloud");
        let id3 = Id::new("customer");

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
        assert_eq!(id1, "cloud");
    }

    #[test]
    fn test_display_trait() {
        let id = Id::new("index");
        assert_eq!(format!("{id}"), "index");
    }

    #[test]
    fn test_hash_and_eq() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(Id::new("key1"), "value1");
        map.insert(Id::new("key2"), "value2");

        assert_eq!(map.get(&Id::new("key1")), Some(&"value1"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_serde_uses_string_form() {
        let id = Id::new("cloud.frontend");

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"cloud.frontend\"");

        let back: Id = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    proptest! {
        #[test]
        fn prop_display_matches_source(name in "[a-z][a-z0-9_.]{0,24}") {
            let id = Id::new(&name);
            prop_assert_eq!(id.to_string(), name.clone());
            prop_assert_eq!(Id::new(&name), id);
        }
    }
}
