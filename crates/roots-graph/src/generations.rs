//! Generation depth of a family, for export reports
//!
//! Only [`RelationshipKind::Parent`] edges count. Exports written before the
//! kind was renamed carry `"parent-child"`, which decodes to the same kind,
//! so both spellings contribute here.

use roots_domain::{Profile, ProfileId, Relationship, RelationshipKind};
use std::collections::{HashMap, HashSet};

/// Maximum number of generations in the graph
///
/// A profile with no recorded parents is one generation deep; otherwise it
/// is one deeper than its deepest parent. A parent already on the current
/// path contributes nothing, which keeps cyclic data finite. Returns 1 for
/// an empty profile list.
pub fn calculate_generations(profiles: &[Profile], relationships: &[Relationship]) -> usize {
    let mut parents_of: HashMap<&ProfileId, Vec<&ProfileId>> = HashMap::new();
    for rel in relationships
        .iter()
        .filter(|rel| rel.kind == RelationshipKind::Parent)
    {
        parents_of
            .entry(&rel.profile_id_2)
            .or_default()
            .push(&rel.profile_id_1);
    }

    profiles
        .iter()
        .map(|profile| depth(&profile.id, &parents_of, &mut HashSet::new()))
        .max()
        .unwrap_or(1)
}

fn depth<'a>(
    profile: &'a ProfileId,
    parents_of: &HashMap<&'a ProfileId, Vec<&'a ProfileId>>,
    path: &mut HashSet<&'a ProfileId>,
) -> usize {
    if !path.insert(profile) {
        return 0;
    }

    let deepest_parent = parents_of
        .get(profile)
        .map(|parents| {
            parents
                .iter()
                .map(|parent| depth(*parent, parents_of, path))
                .max()
                .unwrap_or(0)
        })
        .unwrap_or(0);

    // Path-local: unwind so sibling branches may revisit this profile
    path.remove(profile);
    1 + deepest_parent
}

#[cfg(test)]
mod tests {
    use super::*;
    use roots_domain::{NewProfile, RelationshipId, RelationshipMetadata};

    fn profile(id: &str) -> Profile {
        Profile::from_new(ProfileId::from(id), NewProfile::named(id), "admin1", 0)
    }

    fn parent(parent: &str, child: &str) -> Relationship {
        Relationship {
            id: RelationshipId::new(format!("{parent}->{child}")),
            profile_id_1: ProfileId::from(parent),
            profile_id_2: ProfileId::from(child),
            kind: RelationshipKind::Parent,
            created_by: "admin1".to_string(),
            created_at: 0,
            metadata: RelationshipMetadata::default(),
            updated_by: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_empty_family_is_one_generation() {
        assert_eq!(calculate_generations(&[], &[]), 1);
    }

    #[test]
    fn test_unrelated_profiles_are_one_generation() {
        let profiles = vec![profile("a"), profile("b")];
        assert_eq!(calculate_generations(&profiles, &[]), 1);
    }

    #[test]
    fn test_three_generations() {
        let profiles = vec![profile("grandma"), profile("mum"), profile("kid")];
        let relationships = vec![parent("grandma", "mum"), parent("mum", "kid")];
        assert_eq!(calculate_generations(&profiles, &relationships), 3);
    }

    #[test]
    fn test_legacy_parent_child_spelling_counts() {
        let json = r#"{"id":"r1","profileId1":"mum","profileId2":"kid","type":"parent-child",
                       "createdBy":"admin1","createdAt":0}"#;
        let legacy: Relationship = serde_json::from_str(json).unwrap();
        let profiles = vec![profile("mum"), profile("kid")];
        assert_eq!(calculate_generations(&profiles, &[legacy]), 2);
    }

    #[test]
    fn test_spouse_and_sibling_edges_do_not_add_depth() {
        let profiles = vec![profile("a"), profile("b")];
        let mut spouse = parent("a", "b");
        spouse.kind = RelationshipKind::Spouse;
        assert_eq!(calculate_generations(&profiles, &[spouse]), 1);
    }

    #[test]
    fn test_cycle_terminates() {
        let profiles = vec![profile("a"), profile("b")];
        let relationships = vec![parent("a", "b"), parent("b", "a")];
        assert_eq!(calculate_generations(&profiles, &relationships), 2);
    }

    #[test]
    fn test_diamond_counts_longest_path() {
        let profiles = vec![profile("g"), profile("p1"), profile("p2"), profile("c")];
        let relationships = vec![
            parent("g", "p1"),
            parent("g", "p2"),
            parent("p1", "c"),
            parent("p2", "c"),
        ];
        assert_eq!(calculate_generations(&profiles, &relationships), 3);
    }
}
