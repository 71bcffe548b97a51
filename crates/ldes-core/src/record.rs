use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::field::{Field, Sector, SpanSource};
use crate::normalize::{
    CanonicalRef, CapacityConflict, CapacityConsistency, CapacityTriple, MatchTier, Measurement,
    Resolution, Timeline, UnresolvedReason,
};

/// A company or technology mention and what it resolved to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMatch {
    pub mention: String,
    pub canonical: Option<CanonicalRef>,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<MatchTier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unresolved: Option<UnresolvedReason>,
}

impl EntityMatch {
    #[must_use]
    pub fn from_resolution(mention: impl Into<String>, resolution: Resolution) -> Self {
        let mention = mention.into();
        match resolution {
            Resolution::Resolved {
                canonical,
                confidence,
                tier,
            } => Self {
                mention,
                canonical: Some(canonical),
                confidence,
                tier: Some(tier),
                unresolved: None,
            },
            Resolution::Unresolved { reason } => Self {
                mention,
                canonical: None,
                confidence: 0.0,
                tier: None,
                unresolved: Some(reason),
            },
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.canonical.is_some()
    }

    /// Canonical name when resolved, otherwise the raw mention.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.canonical
            .as_ref()
            .map_or(self.mention.as_str(), |c| c.name.as_str())
    }
}

/// Which extractors backed an accepted field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub sources: Vec<SpanSource>,
    pub confidence: f64,
}

/// Record as assembled from merged fields, before validation. Every field may
/// be missing; the validator decides whether it becomes a `ProjectRecord`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRecord {
    pub source_document_id: String,
    pub sector: Sector,
    pub project_name: Option<String>,
    pub capacity: CapacityTriple,
    pub technology: Option<EntityMatch>,
    pub developer: Option<EntityMatch>,
    pub location: Option<String>,
    pub capex_musd: Option<f64>,
    pub timeline: Timeline,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub provenance: BTreeMap<Field, Provenance>,
}

impl DraftRecord {
    #[must_use]
    pub fn new(source_document_id: impl Into<String>, sector: Sector) -> Self {
        Self {
            source_document_id: source_document_id.into(),
            sector,
            project_name: None,
            capacity: CapacityTriple {
                power_mw: None,
                energy_mwh: None,
                duration_hours: None,
                consistency: CapacityConsistency::Incomplete,
                conflict: None,
            },
            technology: None,
            developer: None,
            location: None,
            capex_musd: None,
            timeline: Timeline::default(),
            provenance: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: CapacityTriple) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_technology(mut self, technology: EntityMatch) -> Self {
        self.technology = Some(technology);
        self
    }

    #[must_use]
    pub fn with_developer(mut self, developer: EntityMatch) -> Self {
        self.developer = Some(developer);
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    #[must_use]
    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = timeline;
        self
    }
}

/// A validated energy-storage project record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: Uuid,
    pub source_document_id: String,
    pub sector: Sector,
    pub project_name: String,
    pub capacity_mw: Option<Measurement>,
    pub capacity_mwh: Option<Measurement>,
    pub duration_hours: Option<Measurement>,
    pub capacity_consistency: CapacityConsistency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity_conflict: Option<CapacityConflict>,
    pub technology: Option<EntityMatch>,
    pub developer: Option<EntityMatch>,
    pub location: Option<String>,
    pub capex_musd: Option<f64>,
    pub timeline: Timeline,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub provenance: BTreeMap<Field, Provenance>,
    pub extracted_at: DateTime<Utc>,
}

impl ProjectRecord {
    /// Promote a draft whose required fields are present.
    #[must_use]
    pub fn from_draft(draft: DraftRecord, project_name: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            source_document_id: draft.source_document_id,
            sector: draft.sector,
            project_name,
            capacity_mw: draft.capacity.power_mw,
            capacity_mwh: draft.capacity.energy_mwh,
            duration_hours: draft.capacity.duration_hours,
            capacity_consistency: draft.capacity.consistency,
            capacity_conflict: draft.capacity.conflict,
            technology: draft.technology,
            developer: draft.developer,
            location: draft.location,
            capex_musd: draft.capex_musd,
            timeline: draft.timeline,
            provenance: draft.provenance,
            extracted_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{Origin, UnitNormalizer};

    #[test]
    fn test_entity_match_from_resolution() {
        let resolved = EntityMatch::from_resolution(
            "Form Energy",
            Resolution::Resolved {
                canonical: CanonicalRef {
                    id: "form-energy".into(),
                    name: "Form Energy Inc.".into(),
                },
                confidence: 0.95,
                tier: MatchTier::Normalized,
            },
        );
        assert!(resolved.is_resolved());
        assert_eq!(resolved.display_name(), "Form Energy Inc.");

        let unresolved = EntityMatch::from_resolution(
            "Form",
            Resolution::Unresolved {
                reason: UnresolvedReason::NoMatch,
            },
        );
        assert!(!unresolved.is_resolved());
        assert_eq!(unresolved.display_name(), "Form");
        assert_eq!(unresolved.unresolved, Some(UnresolvedReason::NoMatch));
    }

    #[test]
    fn test_record_from_draft() {
        let capacity = UnitNormalizer::default()
            .normalize(Some("100 MW"), None, Some("4 hours"))
            .triple;
        let draft = DraftRecord::new("doc-1", Sector::Ldes)
            .with_project_name("Project Alpha")
            .with_capacity(capacity)
            .with_location("Cambridge, MN");

        let record = ProjectRecord::from_draft(draft, "Project Alpha".into());

        assert_eq!(record.source_document_id, "doc-1");
        assert_eq!(record.capacity_consistency, CapacityConsistency::Derived);
        assert_eq!(record.capacity_mwh.unwrap().origin, Origin::Derived);
        assert_eq!(record.capacity_mw.map(|m| m.value), Some(100.0));
    }

    #[test]
    fn test_record_serialization() {
        let draft = DraftRecord::new("doc-2", Sector::Battery).with_project_name("Moss Landing");
        let record = ProjectRecord::from_draft(draft, "Moss Landing".into());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["sector"], "battery");
        assert_eq!(json["capacity_consistency"], "incomplete");
        assert!(json.get("capacity_conflict").is_none());

        let parsed: ProjectRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.id, record.id);
    }
}
