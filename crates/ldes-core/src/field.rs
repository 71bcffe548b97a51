use serde::{Deserialize, Serialize};

/// A project-record field an extractor can produce a value for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    ProjectName,
    CapacityMw,
    CapacityMwh,
    DurationHours,
    Technology,
    Developer,
    Location,
    AnnouncedDate,
    PermittedDate,
    ConstructionDate,
    OperationalDate,
    Capex,
}

/// How a field's raw text is normalized after merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Power,
    Energy,
    Duration,
    Money,
    Company,
    Technology,
    Milestone,
}

impl Field {
    pub const ALL: [Self; 12] = [
        Self::ProjectName,
        Self::CapacityMw,
        Self::CapacityMwh,
        Self::DurationHours,
        Self::Technology,
        Self::Developer,
        Self::Location,
        Self::AnnouncedDate,
        Self::PermittedDate,
        Self::ConstructionDate,
        Self::OperationalDate,
        Self::Capex,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectName => "project_name",
            Self::CapacityMw => "capacity_mw",
            Self::CapacityMwh => "capacity_mwh",
            Self::DurationHours => "duration_hours",
            Self::Technology => "technology",
            Self::Developer => "developer",
            Self::Location => "location",
            Self::AnnouncedDate => "announced_date",
            Self::PermittedDate => "permitted_date",
            Self::ConstructionDate => "construction_date",
            Self::OperationalDate => "operational_date",
            Self::Capex => "capex",
        }
    }

    #[must_use]
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::ProjectName | Self::Location => FieldKind::Text,
            Self::CapacityMw => FieldKind::Power,
            Self::CapacityMwh => FieldKind::Energy,
            Self::DurationHours => FieldKind::Duration,
            Self::Capex => FieldKind::Money,
            Self::Developer => FieldKind::Company,
            Self::Technology => FieldKind::Technology,
            Self::AnnouncedDate
            | Self::PermittedDate
            | Self::ConstructionDate
            | Self::OperationalDate => FieldKind::Milestone,
        }
    }

    /// Short human description used in disambiguation prompts.
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match self {
            Self::ProjectName => "name of the storage project",
            Self::CapacityMw => "power (discharge) capacity, with unit, e.g. \"100 MW\"",
            Self::CapacityMwh => "energy capacity, with unit, e.g. \"400 MWh\"",
            Self::DurationHours => "storage duration, with unit, e.g. \"4 hours\"",
            Self::Technology => "storage technology, e.g. iron-air, lithium-ion, pumped hydro",
            Self::Developer => "company developing the project",
            Self::Location => "project location including state or country",
            Self::AnnouncedDate => "date the project was announced",
            Self::PermittedDate => "date the project was permitted or approved",
            Self::ConstructionDate => "date construction began",
            Self::OperationalDate => "date the project entered or will enter service",
            Self::Capex => "total capital cost, with currency and scale, e.g. \"$50 million\"",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Field {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| crate::Error::InvalidField(s.to_string()))
    }
}

/// Market sector tag supplied by ingestion alongside each document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    #[default]
    Ldes,
    Battery,
    PumpedHydro,
    CompressedAir,
    Thermal,
    Hydrogen,
    Other,
}

impl Sector {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ldes => "ldes",
            Self::Battery => "battery",
            Self::PumpedHydro => "pumped_hydro",
            Self::CompressedAir => "compressed_air",
            Self::Thermal => "thermal",
            Self::Hydrogen => "hydrogen",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for Sector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Sector {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ldes" => Ok(Self::Ldes),
            "battery" => Ok(Self::Battery),
            "pumped_hydro" => Ok(Self::PumpedHydro),
            "compressed_air" => Ok(Self::CompressedAir),
            "thermal" => Ok(Self::Thermal),
            "hydrogen" => Ok(Self::Hydrogen),
            "other" => Ok(Self::Other),
            _ => Err(crate::Error::InvalidSector(s.to_string())),
        }
    }
}

/// Which extractor produced a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanSource {
    Rule,
    Recognizer,
    Llm,
}

impl SpanSource {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Recognizer => "recognizer",
            Self::Llm => "llm",
        }
    }
}

impl std::fmt::Display for SpanSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
