//! Key layout of the family graph inside a key-value store
//!
//! | key                                   | value                         |
//! |---------------------------------------|-------------------------------|
//! | `profile:<id>`                        | [`Profile`](crate::Profile)   |
//! | `relationship:<id>`                   | [`Relationship`](crate::Relationship) |
//! | `profile_relationships:<profile id>`  | list of relationship ids      |
//! | `invitation:<token>`                  | profile id                    |
//! | `relationship_pair:<n>:<a>:<m>:<b>:<kind>` | relationship id          |
//! | `profile_claim:<profile id>`          | claiming user id              |
//!
//! Profile ids are opaque and may contain `:`, so the pair key carries the
//! byte length of each id in front of it.

use crate::{ProfileId, RelationshipId, RelationshipKind};

/// Prefix of profile records
pub const PROFILE_PREFIX: &str = "profile:";

/// Prefix of relationship records
pub const RELATIONSHIP_PREFIX: &str = "relationship:";

/// Prefix of per-profile adjacency indices
pub const PROFILE_RELATIONSHIPS_PREFIX: &str = "profile_relationships:";

/// Prefix of invitation tokens
pub const INVITATION_PREFIX: &str = "invitation:";

/// Prefix of canonical unordered-pair existence keys
pub const RELATIONSHIP_PAIR_PREFIX: &str = "relationship_pair:";

/// Prefix of profile claim locks
pub const PROFILE_CLAIM_PREFIX: &str = "profile_claim:";

/// Key of a profile record
pub fn profile(id: &ProfileId) -> String {
    format!("{PROFILE_PREFIX}{id}")
}

/// Key of a relationship record
pub fn relationship(id: &RelationshipId) -> String {
    format!("{RELATIONSHIP_PREFIX}{id}")
}

/// Key of a profile's adjacency index
pub fn profile_relationships(id: &ProfileId) -> String {
    format!("{PROFILE_RELATIONSHIPS_PREFIX}{id}")
}

/// Key of an invitation token
pub fn invitation(token: &str) -> String {
    format!("{INVITATION_PREFIX}{token}")
}

/// Key written once when a profile is claimed
pub fn profile_claim(id: &ProfileId) -> String {
    format!("{PROFILE_CLAIM_PREFIX}{id}")
}

/// Canonical key for an unordered pair of profiles and a kind
///
/// The two identifiers are sorted before concatenation, so `(a, b)` and
/// `(b, a)` map to the same key for every kind, including the directional
/// `parent` kind. Each id is length-prefixed, so distinct pairs never
/// collide even when ids contain the separator.
pub fn relationship_pair(a: &ProfileId, b: &ProfileId, kind: RelationshipKind) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!(
        "{RELATIONSHIP_PAIR_PREFIX}{}:{low}:{}:{high}:{kind}",
        low.as_str().len(),
        high.as_str().len()
    )
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn any_kind() -> impl Strategy<Value = RelationshipKind> {
        prop_oneof![
            Just(RelationshipKind::Spouse),
            Just(RelationshipKind::Parent),
            Just(RelationshipKind::Sibling),
        ]
    }

    proptest! {
        /// Property: pair keys ignore endpoint order
        #[test]
        fn test_pair_key_order_independent(a in "[a-z0-9-]{1,12}", b in "[a-z0-9-]{1,12}", kind in any_kind()) {
            let a = ProfileId::new(a);
            let b = ProfileId::new(b);
            prop_assert_eq!(relationship_pair(&a, &b, kind), relationship_pair(&b, &a, kind));
        }

        /// Property: different kinds never share a pair key
        #[test]
        fn test_pair_key_distinguishes_kinds(a in "[a-z0-9]{1,12}", b in "[a-z0-9]{1,12}") {
            let a = ProfileId::new(a);
            let b = ProfileId::new(b);
            let spouse = relationship_pair(&a, &b, RelationshipKind::Spouse);
            let parent = relationship_pair(&a, &b, RelationshipKind::Parent);
            let sibling = relationship_pair(&a, &b, RelationshipKind::Sibling);
            prop_assert_ne!(&spouse, &parent);
            prop_assert_ne!(&parent, &sibling);
            prop_assert_ne!(&spouse, &sibling);
        }

        /// Property: distinct unordered pairs never share a pair key
        #[test]
        fn test_pair_key_injective(
            a in "[ab:]{0,4}",
            b in "[ab:]{0,4}",
            c in "[ab:]{0,4}",
            d in "[ab:]{0,4}",
            kind in any_kind(),
        ) {
            let mut first = [a.clone(), b.clone()];
            let mut second = [c.clone(), d.clone()];
            first.sort();
            second.sort();
            prop_assume!(first != second);

            let left = relationship_pair(&ProfileId::new(a), &ProfileId::new(b), kind);
            let right = relationship_pair(&ProfileId::new(c), &ProfileId::new(d), kind);
            prop_assert_ne!(left, right);
        }
    }
}
