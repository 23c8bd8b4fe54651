//! Organizational association model.
//!
//! # Responsibility
//! - Represent a typed, role-labeled link between two identities.
//! - Convert between the typed form and the persisted JSON role map.
//!
//! # Invariants
//! - An association kind names two distinct roles.
//! - Each role resolves to exactly one `UserId`.

use crate::model::identity::UserId;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Role one identity plays inside an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Participant,
    Employer,
    Coach,
    CareSpecialist,
}

impl Role {
    /// Stable key used in the persisted role map and type tags.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Participant => "participant",
            Self::Employer => "employer",
            Self::Coach => "coach",
            Self::CareSpecialist => "cm",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "participant" => Some(Self::Participant),
            "employer" => Some(Self::Employer),
            "coach" => Some(Self::Coach),
            "cm" => Some(Self::CareSpecialist),
            _ => None,
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Association type: an ordered pair of roles, tagged as `primary:secondary`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssociationKind {
    pub primary: Role,
    pub secondary: Role,
}

impl AssociationKind {
    /// Participant employed by an employer.
    pub const PARTICIPANT_EMPLOYER: Self = Self {
        primary: Role::Participant,
        secondary: Role::Employer,
    };

    /// Persisted type tag, e.g. `participant:employer`.
    pub fn tag(&self) -> String {
        format!("{}:{}", self.primary.as_str(), self.secondary.as_str())
    }

    /// Parses a persisted type tag.
    pub fn parse(tag: &str) -> Result<Self, AssociationError> {
        let (primary, secondary) = tag
            .split_once(':')
            .ok_or_else(|| AssociationError::MalformedTag(tag.to_string()))?;
        let primary =
            Role::parse(primary).ok_or_else(|| AssociationError::UnknownRole(primary.to_string()))?;
        let secondary = Role::parse(secondary)
            .ok_or_else(|| AssociationError::UnknownRole(secondary.to_string()))?;
        if primary == secondary {
            return Err(AssociationError::MalformedTag(tag.to_string()));
        }
        Ok(Self { primary, secondary })
    }
}

impl Display for AssociationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.primary, self.secondary)
    }
}

/// One persisted association between two identities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    pub id: i64,
    pub kind: AssociationKind,
    primary: UserId,
    secondary: UserId,
    pub deleted_at: Option<i64>,
}

impl Association {
    /// Builds a live association linking `primary` and `secondary` under `kind`.
    pub fn new(id: i64, kind: AssociationKind, primary: UserId, secondary: UserId) -> Self {
        Self {
            id,
            kind,
            primary,
            secondary,
            deleted_at: None,
        }
    }

    /// Rebuilds an association from its persisted type tag and role map.
    ///
    /// Extra keys in the map are ignored; both roles named by the tag must be
    /// present as UUID strings.
    pub fn from_payload(
        id: i64,
        tag: &str,
        payload: &Value,
        deleted_at: Option<i64>,
    ) -> Result<Self, AssociationError> {
        let kind = AssociationKind::parse(tag)?;
        let members = payload.as_object().ok_or(AssociationError::PayloadNotObject)?;
        Ok(Self {
            id,
            kind,
            primary: member_from_map(members, kind.primary)?,
            secondary: member_from_map(members, kind.secondary)?,
            deleted_at,
        })
    }

    /// Persisted role map, e.g. `{"participant": "<uuid>", "employer": "<uuid>"}`.
    pub fn payload(&self) -> Value {
        let mut members = Map::new();
        members.insert(
            self.kind.primary.as_str().to_string(),
            Value::String(self.primary.to_string()),
        );
        members.insert(
            self.kind.secondary.as_str().to_string(),
            Value::String(self.secondary.to_string()),
        );
        Value::Object(members)
    }

    /// Identity holding `role`, if the association's kind has that role.
    pub fn member(&self, role: Role) -> Option<UserId> {
        if role == self.kind.primary {
            Some(self.primary)
        } else if role == self.kind.secondary {
            Some(self.secondary)
        } else {
            None
        }
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

fn member_from_map(members: &Map<String, Value>, role: Role) -> Result<UserId, AssociationError> {
    let raw = members
        .get(role.as_str())
        .and_then(Value::as_str)
        .ok_or(AssociationError::MissingMember(role))?;
    Uuid::parse_str(raw).map_err(|_| AssociationError::InvalidMember {
        role,
        value: raw.to_string(),
    })
}

/// Errors converting persisted association data into the typed model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociationError {
    MalformedTag(String),
    UnknownRole(String),
    PayloadNotObject,
    MissingMember(Role),
    InvalidMember { role: Role, value: String },
}

impl Display for AssociationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedTag(tag) => write!(f, "malformed association type `{tag}`"),
            Self::UnknownRole(role) => write!(f, "unknown association role `{role}`"),
            Self::PayloadNotObject => write!(f, "association payload must be a JSON object"),
            Self::MissingMember(role) => write!(f, "association payload has no `{role}` member"),
            Self::InvalidMember { role, value } => {
                write!(f, "association `{role}` member is not a uuid: `{value}`")
            }
        }
    }
}

impl Error for AssociationError {}

#[cfg(test)]
mod tests {
    use super::{Association, AssociationError, AssociationKind, Role};
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn participant_employer_tag_roundtrips() {
        let kind = AssociationKind::parse("participant:employer").unwrap();
        assert_eq!(kind, AssociationKind::PARTICIPANT_EMPLOYER);
        assert_eq!(kind.tag(), "participant:employer");
    }

    #[test]
    fn tag_with_repeated_or_unknown_role_is_rejected() {
        assert!(matches!(
            AssociationKind::parse("participant:participant"),
            Err(AssociationError::MalformedTag(_))
        ));
        assert!(matches!(
            AssociationKind::parse("participant:landlord"),
            Err(AssociationError::UnknownRole(role)) if role == "landlord"
        ));
        assert!(matches!(
            AssociationKind::parse("participant"),
            Err(AssociationError::MalformedTag(_))
        ));
    }

    #[test]
    fn payload_members_are_accessible_by_role() {
        let participant = Uuid::new_v4();
        let employer = Uuid::new_v4();
        let payload = json!({
            "participant": participant.to_string(),
            "employer": employer.to_string(),
            "note": "ignored",
        });

        let association =
            Association::from_payload(3, "participant:employer", &payload, None).unwrap();
        assert_eq!(association.member(Role::Participant), Some(participant));
        assert_eq!(association.member(Role::Employer), Some(employer));
        assert_eq!(association.member(Role::Coach), None);
    }

    #[test]
    fn payload_missing_or_invalid_member_is_rejected() {
        let payload = json!({"participant": Uuid::new_v4().to_string()});
        assert_eq!(
            Association::from_payload(1, "participant:employer", &payload, None).unwrap_err(),
            AssociationError::MissingMember(Role::Employer)
        );

        let payload = json!({"participant": "nope", "employer": Uuid::new_v4().to_string()});
        assert!(matches!(
            Association::from_payload(1, "participant:employer", &payload, None),
            Err(AssociationError::InvalidMember { role: Role::Participant, .. })
        ));

        assert_eq!(
            Association::from_payload(1, "participant:employer", &json!([]), None).unwrap_err(),
            AssociationError::PayloadNotObject
        );
    }

    #[test]
    fn payload_is_keyed_by_role() {
        let coach = Uuid::new_v4();
        let participant = Uuid::new_v4();
        let kind = AssociationKind {
            primary: Role::Participant,
            secondary: Role::Coach,
        };
        let association = Association::new(9, kind, participant, coach);

        let payload = association.payload();
        assert_eq!(payload["participant"], json!(participant.to_string()));
        assert_eq!(payload["coach"], json!(coach.to_string()));
    }
}
