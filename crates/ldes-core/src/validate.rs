//! Final gate between a draft record and the outside world.
//!
//! Missing required fields reject the record outright. Conflicts and
//! unresolved entities only flag it for review.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::field::Field;
use crate::issue::Issue;
use crate::normalize::{CapacityConsistency, CapacityTriple};
use crate::record::{DraftRecord, EntityMatch, ProjectRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    ProjectName,
    /// At least one of power, energy or duration
    Capacity,
}

impl Requirement {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectName => "project_name",
            Self::Capacity => "capacity",
        }
    }
}

impl std::fmt::Display for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record rejected for missing required fields. Carries the draft for
/// diagnostics; it is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("record rejected, missing: {}", .missing.iter().map(Requirement::as_str).collect::<Vec<_>>().join(", "))]
pub struct ValidationError {
    pub missing: Vec<Requirement>,
    pub draft: Box<DraftRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Accepted,
    Flagged,
    Rejected,
    Error,
}

impl ValidationStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Flagged => "flagged",
            Self::Rejected => "rejected",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub record: ProjectRecord,
    /// `Accepted` or `Flagged`
    pub status: ValidationStatus,
    pub findings: Vec<Issue>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Validator;

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Two known dimensions with the third missing must be marked unknown;
    /// contradicting values must carry their conflict.
    fn check_capacity(capacity: &mut CapacityTriple, findings: &mut Vec<Issue>) {
        let known = [
            capacity.power_mw.is_some(),
            capacity.energy_mwh.is_some(),
            capacity.duration_hours.is_some(),
        ]
        .iter()
        .filter(|k| **k)
        .count();

        match (known, capacity.conflict) {
            (_, Some(conflict)) => {
                capacity.consistency = CapacityConsistency::Conflict;
                findings.push(Issue::CapacityConflict(conflict));
            }
            (2, None) => capacity.consistency = CapacityConsistency::Unknown,
            (0 | 1, None) => capacity.consistency = CapacityConsistency::Incomplete,
            _ => {}
        }
    }

    fn check_entity(field: Field, entity: Option<&EntityMatch>, findings: &mut Vec<Issue>) {
        if let Some(entity) = entity {
            if let Some(reason) = entity.unresolved {
                findings.push(Issue::UnresolvedEntity {
                    field,
                    mention: entity.mention.clone(),
                    reason,
                });
            }
        }
    }

    pub fn validate(&self, mut draft: DraftRecord) -> Result<Validated, ValidationError> {
        let name = draft
            .project_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from);

        let mut missing = Vec::new();
        if name.is_none() {
            missing.push(Requirement::ProjectName);
        }
        if draft.capacity.is_empty() {
            missing.push(Requirement::Capacity);
        }
        let Some(name) = name.filter(|_| missing.is_empty()) else {
            return Err(ValidationError {
                missing,
                draft: Box::new(draft),
            });
        };

        let mut findings = Vec::new();
        Self::check_capacity(&mut draft.capacity, &mut findings);
        findings.extend(
            draft
                .timeline
                .conflicts
                .iter()
                .cloned()
                .map(Issue::TimelineConflict),
        );
        Self::check_entity(Field::Technology, draft.technology.as_ref(), &mut findings);
        Self::check_entity(Field::Developer, draft.developer.as_ref(), &mut findings);

        let status = if findings.iter().any(Issue::is_flagging) {
            ValidationStatus::Flagged
        } else {
            ValidationStatus::Accepted
        };

        Ok(Validated {
            record: ProjectRecord::from_draft(draft, name),
            status,
            findings,
        })
    }
}
