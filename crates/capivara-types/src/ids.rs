//! Type-safe integer identifier wrappers.
//!
//! Users and games are numbered from 1 in creation order. Assignment is
//! always "largest existing identifier plus one", so identifiers never
//! repeat within a collection even though entities are never deleted.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around `u64` with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// The identifier given to the first entity of an empty collection.
            pub const FIRST: Self = Self(1);

            /// Return the inner integer value.
            pub const fn into_inner(self) -> u64 {
                self.0
            }

            /// The identifier following this one, or `None` on overflow.
            pub const fn next(self) -> Option<Self> {
                match self.0.checked_add(1) {
                    Some(value) => Some(Self(value)),
                    None => None,
                }
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a registered user (`id_usuario`).
    UserId
}

define_id! {
    /// Unique identifier for a game session (`id_jogo`).
    GameId
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn next_increments() {
        assert_eq!(UserId::FIRST.next(), Some(UserId(2)));
        assert_eq!(GameId(u64::MAX).next(), None);
    }

    #[test]
    fn serializes_as_plain_integer() {
        let json = serde_json::to_string(&UserId(7)).unwrap();
        assert_eq!(json, "7");
        let back: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, UserId(7));
    }

    #[test]
    fn works_as_json_map_key() {
        let mut scores = BTreeMap::new();
        scores.insert(UserId(2), 10_u32);
        scores.insert(UserId(1), 5_u32);
        let json = serde_json::to_string(&scores).unwrap();
        assert_eq!(json, r#"{"1":5,"2":10}"#);
        let back: BTreeMap<UserId, u32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, scores);
    }
}
