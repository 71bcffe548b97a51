use serde::{Deserialize, Serialize};

use crate::field::Field;
use crate::ingest::EscalationReason;
use crate::normalize::{CapacityConflict, TimelineConflict, UnresolvedReason};

/// A field-level condition noticed while processing one document.
///
/// None of these abort the document. Only the conflicts and unresolved
/// entities mark a record for review; the rest are diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issue {
    CapacityConflict(CapacityConflict),
    TimelineConflict(TimelineConflict),
    UnresolvedEntity {
        field: Field,
        mention: String,
        reason: UnresolvedReason,
    },
    UnitParse {
        field: Field,
        text: String,
        error: String,
    },
    InvalidValue {
        field: Field,
        text: String,
    },
    RecognizerUnavailable {
        reason: String,
    },
    LlmFailed {
        fields: Vec<Field>,
        reason: String,
    },
    UnresolvedField {
        field: Field,
        reason: EscalationReason,
    },
}

impl Issue {
    /// Whether this condition sends the record to human review.
    #[must_use]
    pub fn is_flagging(&self) -> bool {
        matches!(
            self,
            Self::CapacityConflict(_) | Self::TimelineConflict(_) | Self::UnresolvedEntity { .. }
        )
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CapacityConflict(c) => write!(f, "capacity conflict: {c}"),
            Self::TimelineConflict(c) => write!(f, "timeline conflict: {c}"),
            Self::UnresolvedEntity {
                field,
                mention,
                reason,
            } => write!(f, "{field} '{mention}' unresolved ({reason:?})"),
            Self::UnitParse { field, text, error } => write!(f, "{field} '{text}': {error}"),
            Self::InvalidValue { field, text } => write!(f, "{field} '{text}' could not be parsed"),
            Self::RecognizerUnavailable { reason } => write!(f, "recognizer unavailable: {reason}"),
            Self::LlmFailed { fields, reason } => {
                let names: Vec<&str> = fields.iter().map(Field::as_str).collect();
                write!(f, "disambiguation failed for {}: {reason}", names.join(", "))
            }
            Self::UnresolvedField { field, reason } => {
                write!(f, "{field} left unset ({})", reason.as_str())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Milestone;
    use crate::normalize::MilestoneDate;

    #[test]
    fn test_flagging_issues() {
        let timeline = Issue::TimelineConflict(TimelineConflict {
            earlier: Milestone::Permitted,
            earlier_date: MilestoneDate::year(2026).unwrap(),
            later: Milestone::Operational,
            later_date: MilestoneDate::year(2025).unwrap(),
        });
        assert!(timeline.is_flagging());

        let unresolved = Issue::UnresolvedEntity {
            field: Field::Developer,
            mention: "Form".into(),
            reason: UnresolvedReason::NoMatch,
        };
        assert!(unresolved.is_flagging());

        let degraded = Issue::RecognizerUnavailable {
            reason: "connection refused".into(),
        };
        assert!(!degraded.is_flagging());

        let missing = Issue::UnresolvedField {
            field: Field::Location,
            reason: EscalationReason::Missing,
        };
        assert!(!missing.is_flagging());
    }

    #[test]
    fn test_issue_serialization_is_tagged() {
        let issue = Issue::UnitParse {
            field: Field::CapacityMw,
            text: "100 horsepower".into(),
            error: "unknown unit".into(),
        };
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["kind"], "unit_parse");
        assert_eq!(json["field"], "capacity_mw");
    }
}
