//! Room identity resolution
//!
//! A conversation between two participants is addressed by a canonical room
//! id derived from the unordered pair of their identities: the two ids are
//! sorted lexicographically and joined with a fixed separator. Both sides
//! compute the same id independently, so no negotiation step is needed.

use crate::model::{RoomId, UserId};
use thiserror::Error;

/// Separator between the two identities in a room id.
///
/// Identities containing this character are rejected outright: allowing them
/// would let distinct pairs collide on the same room id.
pub const ROOM_SEPARATOR: char = '-';

/// Errors that can occur while resolving a room id
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    /// One of the identities is unusable for room derivation
    #[error("invalid identity for room resolution: {0}")]
    InvalidIdentity(String),
}

/// Derive the canonical room id for a pair of participants.
///
/// Commutative: `resolve_room(a, b) == resolve_room(b, a)`.
///
/// # Errors
///
/// Returns [`RoomError::InvalidIdentity`] when either identity is empty, when
/// the two identities are equal, or when either identity contains
/// [`ROOM_SEPARATOR`]. Callers must not attempt to join a room on any error.
pub fn resolve_room(a: &UserId, b: &UserId) -> Result<RoomId, RoomError> {
    if a.as_str().is_empty() || b.as_str().is_empty() {
        return Err(RoomError::InvalidIdentity(
            "identity must be non-empty".to_string(),
        ));
    }
    if a == b {
        return Err(RoomError::InvalidIdentity(format!(
            "cannot resolve a room for a single participant: {}",
            a
        )));
    }
    for id in [a, b] {
        if id.as_str().contains(ROOM_SEPARATOR) {
            return Err(RoomError::InvalidIdentity(format!(
                "identity {} contains the room separator {:?}",
                id, ROOM_SEPARATOR
            )));
        }
    }

    let (lo, hi) = if a.as_str() <= b.as_str() {
        (a, b)
    } else {
        (b, a)
    };

    Ok(RoomId(format!("{}{}{}", lo, ROOM_SEPARATOR, hi)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_resolve_room_scenario() {
        let u1 = UserId::new("u1");
        let u2 = UserId::new("u2");

        assert_eq!(resolve_room(&u1, &u2).unwrap().as_str(), "u1-u2");
        assert_eq!(resolve_room(&u2, &u1).unwrap().as_str(), "u1-u2");
    }

    #[test]
    fn test_resolve_room_rejects_empty_identity() {
        let empty = UserId::new("");
        let u1 = UserId::new("u1");

        assert!(matches!(
            resolve_room(&empty, &u1),
            Err(RoomError::InvalidIdentity(_))
        ));
        assert!(matches!(
            resolve_room(&u1, &empty),
            Err(RoomError::InvalidIdentity(_))
        ));
    }

    #[test]
    fn test_resolve_room_rejects_equal_identities() {
        let u1 = UserId::new("u1");
        assert!(matches!(
            resolve_room(&u1, &u1),
            Err(RoomError::InvalidIdentity(_))
        ));
    }

    #[test]
    fn test_resolve_room_rejects_separator_in_identity() {
        let bad = UserId::new("u-1");
        let u2 = UserId::new("u2");
        assert!(matches!(
            resolve_room(&bad, &u2),
            Err(RoomError::InvalidIdentity(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_resolve_room_commutative(
            a in "[a-z0-9]{1,16}",
            b in "[a-z0-9]{1,16}",
        ) {
            prop_assume!(a != b);
            let ida = UserId::new(a);
            let idb = UserId::new(b);

            prop_assert_eq!(
                resolve_room(&ida, &idb).unwrap(),
                resolve_room(&idb, &ida).unwrap()
            );
        }

        #[test]
        fn prop_resolve_room_distinct_pairs_distinct_rooms(
            a in "[a-z0-9]{1,16}",
            b in "[a-z0-9]{1,16}",
            c in "[a-z0-9]{1,16}",
            d in "[a-z0-9]{1,16}",
        ) {
            prop_assume!(a != b && c != d);
            let mut p1 = [a.clone(), b.clone()];
            let mut p2 = [c.clone(), d.clone()];
            p1.sort();
            p2.sort();
            prop_assume!(p1 != p2);

            let r1 = resolve_room(&UserId::new(a), &UserId::new(b)).unwrap();
            let r2 = resolve_room(&UserId::new(c), &UserId::new(d)).unwrap();
            prop_assert_ne!(r1, r2);
        }
    }
}
