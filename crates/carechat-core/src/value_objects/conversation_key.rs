//! Conversation key - the order-independent identity of a direct conversation
//!
//! Both participant ids are rendered as strings, sorted lexicographically and joined
//! with `_`. Every lookup and insert of a conversation goes through this type, so a
//! pair of users can only ever map to one key.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;
use crate::value_objects::Snowflake;

const SEPARATOR: char = '_';

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationKey(String);

impl ConversationKey {
    /// Derive the key for a pair of participants.
    ///
    /// Pure and total; a self-pair still yields a key, so callers that accept
    /// user input go through [`ConversationKey::for_pair`].
    pub fn resolve(a: Snowflake, b: Snowflake) -> Self {
        let (a, b) = (a.to_string(), b.to_string());
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{first}{SEPARATOR}{second}"))
    }

    /// Checked form of [`ConversationKey::resolve`] that rejects self-chat
    pub fn for_pair(a: Snowflake, b: Snowflake) -> Result<Self, DomainError> {
        if a == b {
            return Err(DomainError::validation(
                "a conversation needs two distinct participants",
            ));
        }
        Ok(Self::resolve(a, b))
    }

    /// Parse a stored key back, checking it is in canonical form
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let invalid = || DomainError::validation(format!("invalid conversation key: {raw}"));
        let (a, b) = raw.split_once(SEPARATOR).ok_or_else(invalid)?;
        let a = Snowflake::parse(a).map_err(|_| invalid())?;
        let b = Snowflake::parse(b).map_err(|_| invalid())?;
        let key = Self::for_pair(a, b)?;
        if key.0 != raw {
            return Err(invalid());
        }
        Ok(key)
    }

    /// The two participants, in key order
    pub fn participants(&self) -> (Snowflake, Snowflake) {
        let mut parts = self
            .0
            .split(SEPARATOR)
            .map(|p| Snowflake::parse(p).unwrap_or_default());
        let first = parts.next().unwrap_or_default();
        let second = parts.next().unwrap_or_default();
        (first, second)
    }

    pub fn contains(&self, user_id: Snowflake) -> bool {
        let (a, b) = self.participants();
        a == user_id || b == user_id
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConversationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: i64) -> Snowflake {
        Snowflake::new(n)
    }

    #[test]
    fn test_resolve_is_order_independent() {
        let pairs = [(1, 2), (42, 7), (1_000_000, 999), (i64::MAX, 5)];
        for (a, b) in pairs {
            assert_eq!(
                ConversationKey::resolve(id(a), id(b)),
                ConversationKey::resolve(id(b), id(a))
            );
        }
    }

    #[test]
    fn test_resolve_distinguishes_counterparts() {
        let a = id(100);
        assert_ne!(
            ConversationKey::resolve(a, id(200)),
            ConversationKey::resolve(a, id(300))
        );
        // "12" + "3" and "1" + "23" must not collide
        assert_ne!(
            ConversationKey::resolve(id(12), id(3)),
            ConversationKey::resolve(id(1), id(23))
        );
    }

    #[test]
    fn test_sort_is_lexicographic() {
        // numerically 9 < 10, lexicographically "10" < "9"
        let key = ConversationKey::resolve(id(9), id(10));
        assert_eq!(key.as_str(), "10_9");
        assert_eq!(key.participants(), (id(10), id(9)));
    }

    #[test]
    fn test_for_pair_rejects_self_chat() {
        let err = ConversationKey::for_pair(id(5), id(5)).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_parse_round_trip_and_non_canonical() {
        let key = ConversationKey::resolve(id(3), id(21));
        assert_eq!(ConversationKey::parse(key.as_str()).unwrap(), key);

        assert!(ConversationKey::parse("3_21").is_err());
        assert!(ConversationKey::parse("garbage").is_err());
        assert!(ConversationKey::parse("4_4").is_err());
    }

    #[test]
    fn test_contains() {
        let key = ConversationKey::resolve(id(8), id(16));
        assert!(key.contains(id(8)));
        assert!(key.contains(id(16)));
        assert!(!key.contains(id(32)));
    }
}
