//! Normalization of extracted values: units, entity names, dates.

pub mod resolver;
pub mod timeline;
pub mod units;

pub use resolver::{CanonicalRef, EntityResolver, MatchTier, Resolution, UnresolvedReason};
pub use timeline::{
    DatePrecision, EventSource, Milestone, MilestoneDate, MilestoneEvent, Timeline,
    TimelineConflict, TimelineExtractor,
};
pub use units::{
    CapacityConflict, CapacityConsistency, CapacityTriple, Dimension, Measurement,
    NormalizedCapacity, Origin, Quantity, UnitNormalizer, UnitParseError,
};
