use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;

static QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d[\d,]*(?:\.\d+)?)(?:\s*(?:-|–|—|to)\s*(\d[\d,]*(?:\.\d+)?))?\s*-?\s*([a-z]+(?:[\s-]+(?:hours?|hrs?))?)?",
    )
    .expect("static regex")
});

static MONEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d[\d,]*(?:\.\d+)?)\s*(billion|bn|b|million|mn|mm|m|thousand|k)?\b")
        .expect("static regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitParseError {
    #[error("No numeric value in {0:?}")]
    NoNumber(String),
    #[error("No unit in {0:?}")]
    MissingUnit(String),
    #[error("Unrecognized unit {unit:?} in {text:?}")]
    UnknownUnit { unit: String, text: String },
    #[error("Expected {expected} but {text:?} is {found}")]
    WrongDimension {
        expected: Dimension,
        found: Dimension,
        text: String,
    },
}

pub type UnitResult<T> = Result<T, UnitParseError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Power,
    Energy,
    Duration,
}

impl Dimension {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Power => "power",
            Self::Energy => "energy",
            Self::Duration => "duration",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit synonym table: lowercase surface form, dimension, factor to MW / MWh / hours.
const UNITS: &[(&str, Dimension, f64)] = &[
    ("mw", Dimension::Power, 1.0),
    ("mwe", Dimension::Power, 1.0),
    ("mwac", Dimension::Power, 1.0),
    ("megawatt", Dimension::Power, 1.0),
    ("megawatts", Dimension::Power, 1.0),
    ("gw", Dimension::Power, 1000.0),
    ("gigawatt", Dimension::Power, 1000.0),
    ("gigawatts", Dimension::Power, 1000.0),
    ("kw", Dimension::Power, 0.001),
    ("kwe", Dimension::Power, 0.001),
    ("kilowatt", Dimension::Power, 0.001),
    ("kilowatts", Dimension::Power, 0.001),
    ("mwh", Dimension::Energy, 1.0),
    ("megawatt hour", Dimension::Energy, 1.0),
    ("megawatt hours", Dimension::Energy, 1.0),
    ("megawatthours", Dimension::Energy, 1.0),
    ("gwh", Dimension::Energy, 1000.0),
    ("gigawatt hour", Dimension::Energy, 1000.0),
    ("gigawatt hours", Dimension::Energy, 1000.0),
    ("kwh", Dimension::Energy, 0.001),
    ("kilowatt hour", Dimension::Energy, 0.001),
    ("kilowatt hours", Dimension::Energy, 0.001),
    ("h", Dimension::Duration, 1.0),
    ("hr", Dimension::Duration, 1.0),
    ("hrs", Dimension::Duration, 1.0),
    ("hour", Dimension::Duration, 1.0),
    ("hours", Dimension::Duration, 1.0),
    ("min", Dimension::Duration, 1.0 / 60.0),
    ("mins", Dimension::Duration, 1.0 / 60.0),
    ("minute", Dimension::Duration, 1.0 / 60.0),
    ("minutes", Dimension::Duration, 1.0 / 60.0),
    ("day", Dimension::Duration, 24.0),
    ("days", Dimension::Duration, 24.0),
];

fn lookup_unit(unit: &str) -> Option<(Dimension, f64)> {
    let key = unit
        .to_lowercase()
        .replace('-', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    UNITS
        .iter()
        .find(|(surface, _, _)| *surface == key)
        .map(|(_, dim, factor)| (*dim, *factor))
}

fn parse_number(s: &str) -> Option<f64> {
    s.replace(',', "").parse::<f64>().ok().filter(|v| v.is_finite())
}

/// A parsed quantity in canonical units (MW, MWh or hours).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub dimension: Dimension,
    /// Set when the text gave a range and `value` is its midpoint
    pub uncertain: bool,
}

/// Parse a quantity expression such as "100 MW", "1.2 GWh", "100–120 MW" or "4-hour".
pub fn parse_quantity(text: &str, expected: Dimension) -> UnitResult<Quantity> {
    let caps = QUANTITY
        .captures(text)
        .ok_or_else(|| UnitParseError::NoNumber(text.to_string()))?;

    let low = caps
        .get(1)
        .and_then(|m| parse_number(m.as_str()))
        .ok_or_else(|| UnitParseError::NoNumber(text.to_string()))?;
    let high = caps.get(2).and_then(|m| parse_number(m.as_str()));

    let unit = caps
        .get(3)
        .map(|m| m.as_str().trim())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| UnitParseError::MissingUnit(text.to_string()))?;

    let (dimension, factor) = lookup_unit(unit).ok_or_else(|| UnitParseError::UnknownUnit {
        unit: unit.to_string(),
        text: text.to_string(),
    })?;

    if dimension != expected {
        return Err(UnitParseError::WrongDimension {
            expected,
            found: dimension,
            text: text.to_string(),
        });
    }

    let (value, uncertain) = match high {
        Some(high) => ((low + high) / 2.0, true),
        None => (low, false),
    };

    Ok(Quantity {
        value: value * factor,
        dimension,
        uncertain,
    })
}

/// Parse a monetary amount into millions of US dollars.
///
/// A bare number without a scale word is read as dollars.
pub fn parse_money_musd(text: &str) -> UnitResult<f64> {
    let caps = MONEY
        .captures(text)
        .ok_or_else(|| UnitParseError::NoNumber(text.to_string()))?;
    let value = caps
        .get(1)
        .and_then(|m| parse_number(m.as_str()))
        .ok_or_else(|| UnitParseError::NoNumber(text.to_string()))?;

    let scale = match caps.get(2).map(|m| m.as_str().to_lowercase()).as_deref() {
        Some("billion" | "bn" | "b") => 1000.0,
        Some("million" | "mn" | "mm" | "m") => 1.0,
        Some("thousand" | "k") => 0.001,
        _ => 1e-6,
    };
    Ok(value * scale)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Observed,
    Derived,
}

/// A capacity value and how it was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub value: f64,
    pub origin: Origin,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub uncertain: bool,
}

impl Measurement {
    #[must_use]
    pub fn observed(q: Quantity) -> Self {
        Self {
            value: q.value,
            origin: Origin::Observed,
            uncertain: q.uncertain,
        }
    }

    #[must_use]
    pub fn derived(value: f64, uncertain: bool) -> Self {
        Self {
            value,
            origin: Origin::Derived,
            uncertain,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityConsistency {
    /// All three observed and in agreement
    Consistent,
    /// Two observed, the third computed from them
    Derived,
    /// All three observed and disagreeing beyond tolerance
    Conflict,
    /// Two observed but the third cannot be computed
    Unknown,
    /// Fewer than two dimensions known
    Incomplete,
}

/// Power, energy and duration observed together but mutually inconsistent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Error)]
#[error(
    "{power_mw} MW x {duration_hours} h != {energy_mwh} MWh (relative error {relative_error:.3}, tolerance {tolerance})"
)]
pub struct CapacityConflict {
    pub power_mw: f64,
    pub energy_mwh: f64,
    pub duration_hours: f64,
    pub relative_error: f64,
    pub tolerance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityTriple {
    pub power_mw: Option<Measurement>,
    pub energy_mwh: Option<Measurement>,
    pub duration_hours: Option<Measurement>,
    pub consistency: CapacityConsistency,
    pub conflict: Option<CapacityConflict>,
}

impl CapacityTriple {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.power_mw.is_none() && self.energy_mwh.is_none() && self.duration_hours.is_none()
    }
}

/// Relative disagreement between `power x duration` and `energy`.
#[must_use]
pub fn relative_error(power_mw: f64, energy_mwh: f64, duration_hours: f64) -> f64 {
    let product = power_mw * duration_hours;
    let scale = product.abs().max(energy_mwh.abs());
    if scale == 0.0 {
        0.0
    } else {
        (product - energy_mwh).abs() / scale
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedCapacity {
    pub triple: CapacityTriple,
    pub errors: Vec<(Dimension, UnitParseError)>,
}

pub struct UnitNormalizer {
    tolerance: f64,
}

impl UnitNormalizer {
    #[must_use]
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Parse each raw expression and reconcile the three dimensions.
    /// Unparseable expressions leave their dimension unset.
    #[must_use]
    pub fn normalize(
        &self,
        power: Option<&str>,
        energy: Option<&str>,
        duration: Option<&str>,
    ) -> NormalizedCapacity {
        let mut errors = Vec::new();
        let mut parse = |text: Option<&str>, dim: Dimension| {
            text.and_then(|t| match parse_quantity(t, dim) {
                Ok(q) => Some(q),
                Err(e) => {
                    tracing::debug!(dimension = %dim, error = %e, "Capacity expression rejected");
                    errors.push((dim, e));
                    None
                }
            })
        };

        let power = parse(power, Dimension::Power);
        let energy = parse(energy, Dimension::Energy);
        let duration = parse(duration, Dimension::Duration);

        NormalizedCapacity {
            triple: self.reconcile(power, energy, duration),
            errors,
        }
    }

    #[must_use]
    pub fn reconcile(
        &self,
        power: Option<Quantity>,
        energy: Option<Quantity>,
        duration: Option<Quantity>,
    ) -> CapacityTriple {
        let observed = |q: Option<Quantity>| q.map(Measurement::observed);
        let mut triple = CapacityTriple {
            power_mw: observed(power),
            energy_mwh: observed(energy),
            duration_hours: observed(duration),
            consistency: CapacityConsistency::Incomplete,
            conflict: None,
        };

        match (power, energy, duration) {
            (Some(p), Some(e), Some(d)) => {
                let err = relative_error(p.value, e.value, d.value);
                if err <= self.tolerance {
                    triple.consistency = CapacityConsistency::Consistent;
                } else {
                    triple.consistency = CapacityConsistency::Conflict;
                    triple.conflict = Some(CapacityConflict {
                        power_mw: p.value,
                        energy_mwh: e.value,
                        duration_hours: d.value,
                        relative_error: err,
                        tolerance: self.tolerance,
                    });
                }
            }
            (Some(p), None, Some(d)) => {
                triple.energy_mwh =
                    Some(Measurement::derived(p.value * d.value, p.uncertain || d.uncertain));
                triple.consistency = CapacityConsistency::Derived;
            }
            (Some(p), Some(e), None) => {
                if p.value > 0.0 {
                    triple.duration_hours =
                        Some(Measurement::derived(e.value / p.value, p.uncertain || e.uncertain));
                    triple.consistency = CapacityConsistency::Derived;
                } else {
                    triple.consistency = CapacityConsistency::Unknown;
                }
            }
            (None, Some(e), Some(d)) => {
                if d.value > 0.0 {
                    triple.power_mw =
                        Some(Measurement::derived(e.value / d.value, e.uncertain || d.uncertain));
                    triple.consistency = CapacityConsistency::Derived;
                } else {
                    triple.consistency = CapacityConsistency::Unknown;
                }
            }
            _ => {}
        }

        triple
    }
}

impl Default for UnitNormalizer {
    fn default() -> Self {
        Self::new(0.05)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(value: f64, dimension: Dimension) -> Quantity {
        Quantity {
            value,
            dimension,
            uncertain: false,
        }
    }

    #[test]
    fn test_unit_synonyms() {
        for text in ["100 MW", "100 MWe", "100 megawatts", "0.1 GW", "100,000 kW"] {
            let parsed = parse_quantity(text, Dimension::Power).unwrap();
            assert!((parsed.value - 100.0).abs() < 1e-9, "{text}");
        }
        for text in ["400 MWh", "400 megawatt-hours", "400 megawatt hours", "0.4 GWh"] {
            let parsed = parse_quantity(text, Dimension::Energy).unwrap();
            assert!((parsed.value - 400.0).abs() < 1e-9, "{text}");
        }
        for text in ["4 hours", "4-hour", "4 hrs", "240 minutes"] {
            let parsed = parse_quantity(text, Dimension::Duration).unwrap();
            assert!((parsed.value - 4.0).abs() < 1e-9, "{text}");
        }
    }

    #[test]
    fn test_unrecognized_unit_fails() {
        assert!(matches!(
            parse_quantity("100 horsepower", Dimension::Power),
            Err(UnitParseError::UnknownUnit { unit, .. }) if unit == "horsepower"
        ));
        assert!(matches!(
            parse_quantity("100", Dimension::Power),
            Err(UnitParseError::MissingUnit(_))
        ));
        assert!(matches!(
            parse_quantity("large", Dimension::Power),
            Err(UnitParseError::NoNumber(_))
        ));
    }

    #[test]
    fn test_wrong_dimension() {
        assert!(matches!(
            parse_quantity("400 MWh", Dimension::Power),
            Err(UnitParseError::WrongDimension {
                expected: Dimension::Power,
                found: Dimension::Energy,
                ..
            })
        ));
    }

    #[test]
    fn test_range_yields_uncertain_midpoint() {
        let parsed = parse_quantity("100–120 MW", Dimension::Power).unwrap();
        assert!((parsed.value - 110.0).abs() < 1e-9);
        assert!(parsed.uncertain);

        let parsed = parse_quantity("100 to 120 MW", Dimension::Power).unwrap();
        assert!((parsed.value - 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_money() {
        assert!((parse_money_musd("$50 million").unwrap() - 50.0).abs() < 1e-9);
        assert!((parse_money_musd("$1.2 billion").unwrap() - 1200.0).abs() < 1e-9);
        assert!((parse_money_musd("USD 300m").unwrap() - 300.0).abs() < 1e-9);
        assert!((parse_money_musd("$50,000,000").unwrap() - 50.0).abs() < 1e-9);
        assert!(parse_money_musd("undisclosed").is_err());
    }

    #[test]
    fn test_derives_missing_dimension_exactly() {
        let normalizer = UnitNormalizer::default();
        let cases = [(100.0, 4.0), (5.0, 100.0), (2.5, 8.0), (250.0, 6.0)];

        for (p, d) in cases {
            let triple = normalizer.reconcile(
                Some(q(p, Dimension::Power)),
                None,
                Some(q(d, Dimension::Duration)),
            );
            let energy = triple.energy_mwh.unwrap();
            assert_eq!(energy.value, p * d);
            assert_eq!(energy.origin, Origin::Derived);
            assert_eq!(triple.consistency, CapacityConsistency::Derived);

            let triple = normalizer.reconcile(
                Some(q(p, Dimension::Power)),
                Some(q(p * d, Dimension::Energy)),
                None,
            );
            assert_eq!(triple.duration_hours.unwrap().value, d);

            let triple = normalizer.reconcile(
                None,
                Some(q(p * d, Dimension::Energy)),
                Some(q(d, Dimension::Duration)),
            );
            assert_eq!(triple.power_mw.unwrap().value, p);
        }
    }

    #[test]
    fn test_conflict_never_overwrites() {
        let normalizer = UnitNormalizer::default();
        let triple = normalizer.reconcile(
            Some(q(100.0, Dimension::Power)),
            Some(q(300.0, Dimension::Energy)),
            Some(q(4.0, Dimension::Duration)),
        );

        assert_eq!(triple.consistency, CapacityConsistency::Conflict);
        let conflict = triple.conflict.unwrap();
        assert!((conflict.relative_error - 0.25).abs() < 1e-9);
        assert_eq!(triple.power_mw.unwrap().value, 100.0);
        assert_eq!(triple.energy_mwh.unwrap().value, 300.0);
        assert_eq!(triple.duration_hours.unwrap().value, 4.0);
        assert!(triple.power_mw.unwrap().origin == Origin::Observed);
    }

    #[test]
    fn test_within_tolerance_is_consistent() {
        let normalizer = UnitNormalizer::new(0.05);
        let triple = normalizer.reconcile(
            Some(q(100.0, Dimension::Power)),
            Some(q(390.0, Dimension::Energy)),
            Some(q(4.0, Dimension::Duration)),
        );
        assert_eq!(triple.consistency, CapacityConsistency::Consistent);
        assert!(triple.conflict.is_none());
    }

    #[test]
    fn test_zero_power_marks_unknown() {
        let normalizer = UnitNormalizer::default();
        let triple = normalizer.reconcile(
            Some(q(0.0, Dimension::Power)),
            Some(q(400.0, Dimension::Energy)),
            None,
        );
        assert_eq!(triple.consistency, CapacityConsistency::Unknown);
        assert!(triple.duration_hours.is_none());
    }

    #[test]
    fn test_normalize_reports_parse_errors() {
        let normalizer = UnitNormalizer::default();
        let out = normalizer.normalize(Some("100 MW"), Some("lots of MWh"), Some("4 hours"));

        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].0, Dimension::Energy);
        let energy = out.triple.energy_mwh.unwrap();
        assert_eq!(energy.value, 400.0);
        assert_eq!(energy.origin, Origin::Derived);
    }
}
