//! Relationship module - typed edges between two profiles

use crate::{Profile, ProfileId, RelationshipId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of relationship between two profiles
///
/// `Parent` is directional: the first endpoint is the parent and the second
/// the child. `Spouse` and `Sibling` are symmetric in meaning even though
/// the endpoints are stored in an arbitrary order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipKind {
    /// Married or partnered
    Spouse,

    /// First endpoint is the parent of the second.
    /// Older exports spell this `parent-child`; both names decode here.
    #[serde(alias = "parent-child")]
    Parent,

    /// Share at least one parent
    Sibling,
}

impl RelationshipKind {
    /// All kinds, in display order
    pub const ALL: [RelationshipKind; 3] = [Self::Spouse, Self::Parent, Self::Sibling];

    /// Canonical wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::Spouse => "spouse",
            RelationshipKind::Parent => "parent",
            RelationshipKind::Sibling => "sibling",
        }
    }

    /// Whether the order of the endpoints carries meaning
    pub fn is_directional(&self) -> bool {
        matches!(self, RelationshipKind::Parent)
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spouse" => Ok(RelationshipKind::Spouse),
            "parent" | "parent-child" => Ok(RelationshipKind::Parent),
            "sibling" => Ok(RelationshipKind::Sibling),
            _ => Err(format!("Unknown relationship type: {}", s)),
        }
    }
}

/// Optional descriptive data attached to an edge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipMetadata {
    /// Date of marriage (spouse edges)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marriage_date: Option<String>,

    /// Place of marriage (spouse edges)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marriage_place: Option<String>,

    /// Date of divorce (spouse edges)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub divorce_date: Option<String>,

    /// Free-text notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl RelationshipMetadata {
    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.marriage_date.is_none()
            && self.marriage_place.is_none()
            && self.divorce_date.is_none()
            && self.notes.is_none()
    }
}

/// A typed edge between two distinct profiles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Unique identifier
    pub id: RelationshipId,

    /// First endpoint (the parent, for `Parent` edges)
    #[serde(rename = "profileId1")]
    pub profile_id_1: ProfileId,

    /// Second endpoint (the child, for `Parent` edges)
    #[serde(rename = "profileId2")]
    pub profile_id_2: ProfileId,

    /// Relationship kind
    #[serde(rename = "type")]
    pub kind: RelationshipKind,

    /// Account that created the edge
    #[serde(rename = "createdBy")]
    pub created_by: String,

    /// Creation time (Unix milliseconds)
    #[serde(rename = "createdAt")]
    pub created_at: u64,

    /// Descriptive metadata
    #[serde(default)]
    pub metadata: RelationshipMetadata,

    /// Account that last updated the edge
    #[serde(rename = "updatedBy", default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,

    /// Last update time (Unix milliseconds)
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<u64>,
}

impl Relationship {
    /// Whether `profile` is one of the two endpoints
    pub fn involves(&self, profile: &ProfileId) -> bool {
        &self.profile_id_1 == profile || &self.profile_id_2 == profile
    }

    /// The endpoint that is not `profile`, or `None` if `profile` is not on this edge
    pub fn other_endpoint(&self, profile: &ProfileId) -> Option<&ProfileId> {
        if &self.profile_id_1 == profile {
            Some(&self.profile_id_2)
        } else if &self.profile_id_2 == profile {
            Some(&self.profile_id_1)
        } else {
            None
        }
    }

    /// Apply a partial update, stamping the editor and time
    pub fn apply(&mut self, update: RelationshipUpdate, user_id: &str, now: u64) {
        if let Some(kind) = update.kind {
            self.kind = kind;
        }
        if let Some(marriage_date) = update.marriage_date {
            self.metadata.marriage_date = Some(marriage_date);
        }
        if let Some(marriage_place) = update.marriage_place {
            self.metadata.marriage_place = Some(marriage_place);
        }
        if let Some(divorce_date) = update.divorce_date {
            self.metadata.divorce_date = Some(divorce_date);
        }
        if let Some(notes) = update.notes {
            self.metadata.notes = Some(notes);
        }
        self.updated_by = Some(user_id.to_string());
        self.updated_at = Some(now);
    }
}

/// Partial update of an edge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipUpdate {
    /// New kind; uniqueness is re-checked when this changes
    #[serde(rename = "type", alias = "relationType", default)]
    pub kind: Option<RelationshipKind>,
    /// New marriage date
    #[serde(default)]
    pub marriage_date: Option<String>,
    /// New marriage place
    #[serde(default)]
    pub marriage_place: Option<String>,
    /// New divorce date
    #[serde(default)]
    pub divorce_date: Option<String>,
    /// New notes
    #[serde(default)]
    pub notes: Option<String>,
}

/// A profile reached through an edge, annotated with that edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedProfile {
    /// The profile at the other end of the edge
    #[serde(flatten)]
    pub profile: Profile,

    /// Edge the profile was reached through
    #[serde(rename = "relationshipId")]
    pub relationship_id: RelationshipId,

    /// Marriage date (spouses only)
    #[serde(rename = "marriageDate", default, skip_serializing_if = "Option::is_none")]
    pub marriage_date: Option<String>,

    /// Marriage place (spouses only)
    #[serde(rename = "marriagePlace", default, skip_serializing_if = "Option::is_none")]
    pub marriage_place: Option<String>,

    /// Divorce date (spouses only)
    #[serde(rename = "divorceDate", default, skip_serializing_if = "Option::is_none")]
    pub divorce_date: Option<String>,
}

impl RelatedProfile {
    /// Annotate `profile` with the edge it was reached through
    pub fn via(profile: Profile, relationship: &Relationship) -> Self {
        Self {
            profile,
            relationship_id: relationship.id.clone(),
            marriage_date: None,
            marriage_place: None,
            divorce_date: None,
        }
    }

    /// Same as [`RelatedProfile::via`], carrying the edge's marriage metadata
    pub fn spouse_via(profile: Profile, relationship: &Relationship) -> Self {
        Self {
            marriage_date: relationship.metadata.marriage_date.clone(),
            marriage_place: relationship.metadata.marriage_place.clone(),
            divorce_date: relationship.metadata.divorce_date.clone(),
            ..Self::via(profile, relationship)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(a: &str, b: &str, kind: RelationshipKind) -> Relationship {
        Relationship {
            id: RelationshipId::from("r1"),
            profile_id_1: ProfileId::from(a),
            profile_id_2: ProfileId::from(b),
            kind,
            created_by: "admin1".to_string(),
            created_at: 1,
            metadata: RelationshipMetadata::default(),
            updated_by: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(serde_json::to_string(&RelationshipKind::Parent).unwrap(), r#""parent""#);
        let legacy: RelationshipKind = serde_json::from_str(r#""parent-child""#).unwrap();
        assert_eq!(legacy, RelationshipKind::Parent);
        assert_eq!("sibling".parse::<RelationshipKind>(), Ok(RelationshipKind::Sibling));
        assert!("cousin".parse::<RelationshipKind>().is_err());
    }

    #[test]
    fn test_other_endpoint_is_symmetric() {
        let rel = edge("p1", "p2", RelationshipKind::Spouse);
        assert_eq!(rel.other_endpoint(&ProfileId::from("p1")), Some(&ProfileId::from("p2")));
        assert_eq!(rel.other_endpoint(&ProfileId::from("p2")), Some(&ProfileId::from("p1")));
        assert_eq!(rel.other_endpoint(&ProfileId::from("p3")), None);
        assert!(!rel.involves(&ProfileId::from("p3")));
    }

    #[test]
    fn test_wire_field_names() {
        let mut rel = edge("p1", "p2", RelationshipKind::Spouse);
        rel.metadata.marriage_date = Some("2001-05-01".to_string());
        let json = serde_json::to_value(&rel).unwrap();
        assert_eq!(json["profileId1"], "p1");
        assert_eq!(json["profileId2"], "p2");
        assert_eq!(json["type"], "spouse");
        assert_eq!(json["metadata"]["marriage_date"], "2001-05-01");
        assert!(json.get("updatedAt").is_none());
    }

    #[test]
    fn test_apply_stamps_editor() {
        let mut rel = edge("p1", "p2", RelationshipKind::Spouse);
        rel.apply(
            RelationshipUpdate {
                divorce_date: Some("2010-01-01".to_string()),
                ..Default::default()
            },
            "editor",
            99,
        );
        assert_eq!(rel.metadata.divorce_date.as_deref(), Some("2010-01-01"));
        assert_eq!(rel.updated_by.as_deref(), Some("editor"));
        assert_eq!(rel.updated_at, Some(99));
        assert_eq!(rel.kind, RelationshipKind::Spouse);
    }
}
