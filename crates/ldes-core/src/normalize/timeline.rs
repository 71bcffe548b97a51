//! Lifecycle milestones from date expressions.
//!
//! Dates keep the precision they were written with: "Q3 2024" stays a quarter
//! and is never pinned to a fabricated day. A date becomes a milestone only
//! when a trigger phrase sits in the same clause; dates with no trigger are
//! dropped.

use chrono::{Datelike, Months, NaiveDate};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::config::TimelineConfig;
use crate::field::Field;
use crate::text;

const MONTHS: &str = r"jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?";

type DateParser = fn(&Captures<'_>) -> Option<MilestoneDate>;

struct DatePattern {
    regex: Regex,
    parse: DateParser,
    bare_year: bool,
}

/// Most specific first; later patterns never claim text an earlier one matched.
static DATE_PATTERNS: LazyLock<Vec<DatePattern>> = LazyLock::new(|| {
    let pattern = |re: &str, parse: DateParser, bare_year: bool| DatePattern {
        regex: Regex::new(re).expect("static regex"),
        parse,
        bare_year,
    };
    vec![
        pattern(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b", parse_iso, false),
        pattern(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b", parse_us, false),
        pattern(
            &format!(r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+({MONTHS})\.?,?\s+(\d{{4}})\b"),
            parse_day_month_year,
            false,
        ),
        pattern(
            &format!(r"(?i)\b({MONTHS})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})\b"),
            parse_month_day_year,
            false,
        ),
        pattern(
            &format!(r"(?i)\b({MONTHS})\.?,?\s+(?:of\s+)?(\d{{4}})\b"),
            parse_month_year,
            false,
        ),
        pattern(
            r"(?i)\b(?:q([1-4])|([1-4])q)\s*(?:of\s+)?'?((?:19|20)\d{2})\b",
            parse_quarter,
            false,
        ),
        pattern(
            r"(?i)\b(first|second|third|fourth|1st|2nd|3rd|4th)\s+quarter\s+(?:of\s+)?((?:19|20)\d{2})\b",
            parse_ordinal_quarter,
            false,
        ),
        pattern(r"\b((?:19|20)\d{2})\b", parse_year, true),
    ]
});

/// A four-digit number followed by one of these is a quantity, not a year.
static QUANTITY_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:[mgk]wh?\b|megawatt|gigawatt|kilowatt|hours?\b|hrs?\b|h\b|%|percent|acres?\b|homes\b|households\b|tons?\b|tonnes?\b|feet\b|ft\b|miles?\b|jobs\b|units\b|cycles\b)",
    )
    .expect("static regex")
});

static TRIGGERS: LazyLock<Vec<(Milestone, Regex)>> = LazyLock::new(|| {
    let trigger = |m: Milestone, re: &str| (m, Regex::new(re).expect("static regex"));
    vec![
        trigger(
            Milestone::Operational,
            r"(?i)\b(?:in[\s-]service|operational|commercial operations?|(?-i:COD)|online|on-line|energi[sz]ed|commissioned|(?:begin|began|start|started|commence[sd]?)\s+operations?|enter(?:ed|s)?\s+service)\b",
        ),
        trigger(
            Milestone::UnderConstruction,
            r"(?i)\b(?:construction|broke ground|break(?:s)? ground|broken ground|ground-?breaking)\b",
        ),
        trigger(
            Milestone::Permitted,
            r"(?i)\b(?:permit(?:s|ted)?|approv(?:al|ed|es)|authori[sz](?:ed|ation)|certificate|licen[sc]e[ds]?)\b",
        ),
        trigger(
            Milestone::Announced,
            r"(?i)\b(?:announc(?:ed|es|ement|ing)|unveil(?:ed|s|ing)?|revealed|proposed)\b",
        ),
    ]
});

/// Lifecycle stages in the order a project passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    Announced,
    Permitted,
    UnderConstruction,
    Operational,
}

impl Milestone {
    pub const ALL: [Self; 4] = [
        Self::Announced,
        Self::Permitted,
        Self::UnderConstruction,
        Self::Operational,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Announced => "announced",
            Self::Permitted => "permitted",
            Self::UnderConstruction => "under_construction",
            Self::Operational => "operational",
        }
    }

    /// Field holding a labelled date for this milestone.
    #[must_use]
    pub fn field(&self) -> Field {
        match self {
            Self::Announced => Field::AnnouncedDate,
            Self::Permitted => Field::PermittedDate,
            Self::UnderConstruction => Field::ConstructionDate,
            Self::Operational => Field::OperationalDate,
        }
    }

    #[must_use]
    pub fn from_field(field: Field) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.field() == field)
    }

    /// Rank used when several kinds of trigger surround one date. Higher wins.
    fn priority(self) -> u8 {
        match self {
            Self::Operational => 3,
            Self::UnderConstruction => 2,
            Self::Permitted => 1,
            Self::Announced => 0,
        }
    }
}

impl std::fmt::Display for Milestone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePrecision {
    Day,
    Month,
    Quarter,
    Year,
}

/// A date as written: the first day of the period plus its precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MilestoneDate {
    pub start: NaiveDate,
    pub precision: DatePrecision,
}

impl MilestoneDate {
    #[must_use]
    pub fn day(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(|start| Self {
            start,
            precision: DatePrecision::Day,
        })
    }

    #[must_use]
    pub fn month(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|start| Self {
            start,
            precision: DatePrecision::Month,
        })
    }

    #[must_use]
    pub fn quarter(year: i32, quarter: u32) -> Option<Self> {
        if !(1..=4).contains(&quarter) {
            return None;
        }
        NaiveDate::from_ymd_opt(year, (quarter - 1) * 3 + 1, 1).map(|start| Self {
            start,
            precision: DatePrecision::Quarter,
        })
    }

    #[must_use]
    pub fn year(year: i32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, 1, 1).map(|start| Self {
            start,
            precision: DatePrecision::Year,
        })
    }

    /// Last day of the period.
    #[must_use]
    pub fn end(&self) -> NaiveDate {
        let months = match self.precision {
            DatePrecision::Day => return self.start,
            DatePrecision::Month => 1,
            DatePrecision::Quarter => 3,
            DatePrecision::Year => 12,
        };
        self.start
            .checked_add_months(Months::new(months))
            .and_then(|next| next.pred_opt())
            .unwrap_or(self.start)
    }
}

impl std::fmt::Display for MilestoneDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let year = self.start.year();
        match self.precision {
            DatePrecision::Day => write!(f, "{}", self.start.format("%Y-%m-%d")),
            DatePrecision::Month => write!(f, "{}", self.start.format("%Y-%m")),
            DatePrecision::Quarter => write!(f, "{year}-Q{}", self.start.month0() / 3 + 1),
            DatePrecision::Year => write!(f, "{year}"),
        }
    }
}

fn month_number(name: &str) -> Option<u32> {
    let key: String = name.chars().take(3).collect::<String>().to_lowercase();
    let month = match key.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn num<T: std::str::FromStr>(caps: &Captures<'_>, group: usize) -> Option<T> {
    caps.get(group)?.as_str().parse().ok()
}

fn parse_iso(caps: &Captures<'_>) -> Option<MilestoneDate> {
    MilestoneDate::day(num(caps, 1)?, num(caps, 2)?, num(caps, 3)?)
}

fn parse_us(caps: &Captures<'_>) -> Option<MilestoneDate> {
    MilestoneDate::day(num(caps, 3)?, num(caps, 1)?, num(caps, 2)?)
}

fn parse_day_month_year(caps: &Captures<'_>) -> Option<MilestoneDate> {
    MilestoneDate::day(num(caps, 3)?, month_number(caps.get(2)?.as_str())?, num(caps, 1)?)
}

fn parse_month_day_year(caps: &Captures<'_>) -> Option<MilestoneDate> {
    MilestoneDate::day(num(caps, 3)?, month_number(caps.get(1)?.as_str())?, num(caps, 2)?)
}

fn parse_month_year(caps: &Captures<'_>) -> Option<MilestoneDate> {
    MilestoneDate::month(num(caps, 2)?, month_number(caps.get(1)?.as_str())?)
}

fn parse_quarter(caps: &Captures<'_>) -> Option<MilestoneDate> {
    let quarter = num(caps, 1).or_else(|| num(caps, 2))?;
    MilestoneDate::quarter(num(caps, 3)?, quarter)
}

fn parse_ordinal_quarter(caps: &Captures<'_>) -> Option<MilestoneDate> {
    let quarter = match caps.get(1)?.as_str().to_lowercase().as_str() {
        "first" | "1st" => 1,
        "second" | "2nd" => 2,
        "third" | "3rd" => 3,
        "fourth" | "4th" => 4,
        _ => return None,
    };
    MilestoneDate::quarter(num(caps, 2)?, quarter)
}

fn parse_year(caps: &Captures<'_>) -> Option<MilestoneDate> {
    MilestoneDate::year(num(caps, 1)?)
}

fn looks_like_quantity(text: &str, start: usize, end: usize) -> bool {
    if QUANTITY_SUFFIX.is_match(&text[end..]) {
        return true;
    }
    let mut before = text[..start].chars().rev();
    match before.next() {
        Some('$' | '#') => true,
        Some('.' | ',') => before.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}

/// A date found in running text, with character offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateMention {
    pub start: usize,
    pub end: usize,
    pub date: MilestoneDate,
}

/// Every date expression in `text`, in document order.
#[must_use]
pub fn find_dates(text: &str) -> Vec<DateMention> {
    let mut claimed: Vec<(usize, usize, MilestoneDate)> = Vec::new();

    for pattern in DATE_PATTERNS.iter() {
        for caps in pattern.regex.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let (start, end) = (whole.start(), whole.end());
            if claimed.iter().any(|(s, e, _)| start < *e && *s < end) {
                continue;
            }
            if pattern.bare_year && looks_like_quantity(text, start, end) {
                continue;
            }
            if let Some(date) = (pattern.parse)(&caps) {
                claimed.push((start, end, date));
            }
        }
    }

    claimed.sort_by_key(|(start, _, _)| *start);
    claimed
        .into_iter()
        .map(|(start, end, date)| DateMention {
            start: text::char_offset(text, start),
            end: text::char_offset(text, end),
            date,
        })
        .collect()
}

/// The first date expression in `text`.
#[must_use]
pub fn parse_date(text: &str) -> Option<MilestoneDate> {
    find_dates(text).into_iter().next().map(|m| m.date)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    /// Stated against an explicit label such as "COD:"
    Labeled,
    /// Inferred from a nearby trigger phrase
    Context,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneEvent {
    pub milestone: Milestone,
    pub date: MilestoneDate,
    pub source: EventSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
}

/// A later stage dated entirely before an earlier one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{later} ({later_date}) precedes {earlier} ({earlier_date})")]
pub struct TimelineConflict {
    pub earlier: Milestone,
    pub earlier_date: MilestoneDate,
    pub later: Milestone,
    pub later_date: MilestoneDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    /// At most one event per milestone, in lifecycle order
    pub events: Vec<MilestoneEvent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<TimelineConflict>,
}

impl Timeline {
    #[must_use]
    pub fn get(&self, milestone: Milestone) -> Option<&MilestoneEvent> {
        self.events.iter().find(|e| e.milestone == milestone)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// Partial-order check over assembled events. Overlapping imprecise periods
/// ("2025" vs "Q2 2025") are not conflicts.
#[must_use]
pub fn check_order(events: &[MilestoneEvent]) -> Vec<TimelineConflict> {
    let mut conflicts = Vec::new();
    for (i, earlier) in events.iter().enumerate() {
        for later in &events[i + 1..] {
            let (earlier, later) = if earlier.milestone <= later.milestone {
                (earlier, later)
            } else {
                (later, earlier)
            };
            if earlier.milestone != later.milestone && later.date.end() < earlier.date.start {
                conflicts.push(TimelineConflict {
                    earlier: earlier.milestone,
                    earlier_date: earlier.date,
                    later: later.milestone,
                    later_date: later.date,
                });
            }
        }
    }
    conflicts
}

struct TriggerHit {
    milestone: Milestone,
    start: usize,
    end: usize,
    phrase: String,
}

/// Characters between two char-offset ranges, or zero when they overlap.
fn gap(a: (usize, usize), b: (usize, usize)) -> usize {
    if a.1 <= b.0 {
        b.0 - a.1
    } else if b.1 <= a.0 {
        a.0 - b.1
    } else {
        0
    }
}

fn crosses_clause(text: &str, a: (usize, usize), b: (usize, usize)) -> bool {
    let (from, to) = if a.1 <= b.0 { (a.1, b.0) } else { (b.1, a.0) };
    if from >= to {
        return false;
    }
    let between = text::char_slice(text, from, to).unwrap_or_default();
    let mut chars = between.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\n' | ';' | ',' => return true,
            '.' if chars.peek().is_none_or(|n| n.is_whitespace()) => return true,
            _ => {}
        }
    }
    false
}

pub struct TimelineExtractor {
    window: usize,
}

impl TimelineExtractor {
    #[must_use]
    pub fn new(config: &TimelineConfig) -> Self {
        Self {
            window: config.trigger_window,
        }
    }

    fn triggers(text: &str) -> Vec<TriggerHit> {
        TRIGGERS
            .iter()
            .flat_map(|(milestone, regex)| {
                regex.find_iter(text).map(|m| TriggerHit {
                    milestone: *milestone,
                    start: text::char_offset(text, m.start()),
                    end: text::char_offset(text, m.end()),
                    phrase: m.as_str().to_string(),
                })
            })
            .collect()
    }

    /// Milestones inferred from trigger phrases around dates in `text`.
    ///
    /// Each trigger occurrence belongs to the nearest date in its clause. A
    /// date surrounded by several kinds of trigger takes the highest-priority
    /// kind, then the closest phrase. When one milestone lands on several
    /// dates, the one with the closest trigger wins.
    #[must_use]
    pub fn extract(&self, text: &str) -> Vec<MilestoneEvent> {
        let dates = find_dates(text);
        if dates.is_empty() {
            return Vec::new();
        }

        let hits = Self::triggers(text);
        // date index -> (trigger, distance)
        let mut owned: Vec<Vec<(&TriggerHit, usize)>> = vec![Vec::new(); dates.len()];
        for hit in &hits {
            let nearest = dates
                .iter()
                .enumerate()
                .filter_map(|(i, d)| {
                    let distance = gap((hit.start, hit.end), (d.start, d.end));
                    (distance <= self.window
                        && !crosses_clause(text, (hit.start, hit.end), (d.start, d.end)))
                    .then_some((i, distance))
                })
                .min_by_key(|(i, distance)| (*distance, *i));
            if let Some((i, distance)) = nearest {
                owned[i].push((hit, distance));
            }
        }

        let mut best: BTreeMap<Milestone, (usize, MilestoneEvent)> = BTreeMap::new();
        for (date, triggers) in dates.iter().zip(&owned) {
            let Some((hit, distance)) = triggers
                .iter()
                .max_by(|a, b| {
                    a.0.milestone
                        .priority()
                        .cmp(&b.0.milestone.priority())
                        .then(b.1.cmp(&a.1))
                })
                .copied()
            else {
                continue;
            };

            tracing::debug!(
                date = %date.date,
                milestone = %hit.milestone,
                trigger = %hit.phrase,
                distance,
                "Classified date"
            );

            let event = MilestoneEvent {
                milestone: hit.milestone,
                date: date.date,
                source: EventSource::Context,
                trigger: Some(hit.phrase.clone()),
            };
            match best.get(&hit.milestone) {
                Some((existing, _)) if *existing <= distance => {}
                _ => {
                    best.insert(hit.milestone, (distance, event));
                }
            }
        }

        best.into_values().map(|(_, event)| event).collect()
    }

    /// Build the document timeline. Labelled dates win over inferred ones for
    /// the same milestone; ordering violations are annotated, not dropped.
    #[must_use]
    pub fn assemble(&self, labeled: &[(Milestone, String)], text: &str) -> Timeline {
        let mut events: BTreeMap<Milestone, MilestoneEvent> = BTreeMap::new();

        for (milestone, value) in labeled {
            match parse_date(value) {
                Some(date) => {
                    events.entry(*milestone).or_insert(MilestoneEvent {
                        milestone: *milestone,
                        date,
                        source: EventSource::Labeled,
                        trigger: None,
                    });
                }
                None => tracing::debug!(milestone = %milestone, value = %value, "Unparseable milestone date"),
            }
        }

        for event in self.extract(text) {
            events.entry(event.milestone).or_insert(event);
        }

        let events: Vec<MilestoneEvent> = events.into_values().collect();
        let conflicts = check_order(&events);
        for conflict in &conflicts {
            tracing::debug!(%conflict, "Timeline out of order");
        }
        Timeline { events, conflicts }
    }
}

impl Default for TimelineExtractor {
    fn default() -> Self {
        Self::new(&TimelineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dates(text: &str) -> Vec<String> {
        find_dates(text).iter().map(|m| m.date.to_string()).collect()
    }

    #[test]
    fn test_date_formats() {
        assert_eq!(dates("filed 2023-05-15"), vec!["2023-05-15"]);
        assert_eq!(dates("filed 5/15/2023"), vec!["2023-05-15"]);
        assert_eq!(dates("on 15 May 2023"), vec!["2023-05-15"]);
        assert_eq!(dates("on May 15, 2023"), vec!["2023-05-15"]);
        assert_eq!(dates("in September 2024"), vec!["2024-09"]);
        assert_eq!(dates("by Q3 2024"), vec!["2024-Q3"]);
        assert_eq!(dates("in the third quarter of 2024"), vec!["2024-Q3"]);
        assert_eq!(dates("by 2026"), vec!["2026"]);
    }

    #[test]
    fn test_quantities_are_not_years() {
        assert!(dates("a 2000 MWh system").is_empty());
        assert!(dates("costing $2025 per kW").is_empty());
        assert!(dates("about 1,2000 units").is_empty());
        assert_eq!(dates("2030 target, 1500 MW"), vec!["2030"]);
    }

    #[test]
    fn test_invalid_calendar_date_skipped() {
        assert!(find_dates("2023-02-30").iter().all(|m| m.date.precision != DatePrecision::Day));
    }

    #[test]
    fn test_precision_is_kept() {
        let q = parse_date("Q3 2024").unwrap();
        assert_eq!(q.precision, DatePrecision::Quarter);
        assert_eq!(q.start, NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
        assert_eq!(q.end(), NaiveDate::from_ymd_opt(2024, 9, 30).unwrap());

        let m = parse_date("February 2024").unwrap();
        assert_eq!(m.end(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let y = parse_date("2025").unwrap();
        assert_eq!(y.end(), NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    }

    #[test]
    fn test_triggers_classify_dates() {
        let text = "The project was announced in March 2021, permitted in 2022, \
                    broke ground in June 2023 and will be in service by Q4 2025.";
        let events = TimelineExtractor::default().extract(text);
        let got: Vec<(Milestone, String)> = events
            .iter()
            .map(|e| (e.milestone, e.date.to_string()))
            .collect();

        assert_eq!(
            got,
            vec![
                (Milestone::Announced, "2021-03".to_string()),
                (Milestone::Permitted, "2022".to_string()),
                (Milestone::UnderConstruction, "2023-06".to_string()),
                (Milestone::Operational, "2025-Q4".to_string()),
            ]
        );
    }

    #[test]
    fn test_priority_then_distance() {
        // Both kinds of trigger share the clause; the higher-priority one wins.
        let events = TimelineExtractor::default()
            .extract("Construction starts in 2024 with commercial operation expected");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].milestone, Milestone::Operational);

        // Same kind twice: the nearer phrase is recorded.
        let events = TimelineExtractor::default()
            .extract("construction financing closed before the groundbreaking in 2024");
        assert_eq!(events[0].milestone, Milestone::UnderConstruction);
        assert_eq!(events[0].trigger.as_deref(), Some("groundbreaking"));
    }

    #[test]
    fn test_date_without_trigger_dropped() {
        let events = TimelineExtractor::default().extract("The company was founded in 2017.");
        assert!(events.is_empty());
    }

    #[test]
    fn test_trigger_outside_window_ignored() {
        let extractor = TimelineExtractor::new(&TimelineConfig { trigger_window: 10 });
        let events = extractor.extract("operational status depends on many things in 2026");
        assert!(events.is_empty());
    }

    #[test]
    fn test_labeled_conflict_is_annotated() {
        let labeled = vec![
            (Milestone::Announced, "2023".to_string()),
            (Milestone::Operational, "2025".to_string()),
            (Milestone::Permitted, "2026".to_string()),
        ];
        let timeline = TimelineExtractor::default().assemble(&labeled, "");

        assert_eq!(timeline.events.len(), 3);
        assert_eq!(timeline.events[0].milestone, Milestone::Announced);
        assert_eq!(timeline.conflicts.len(), 1);
        let conflict = &timeline.conflicts[0];
        assert_eq!(conflict.earlier, Milestone::Permitted);
        assert_eq!(conflict.later, Milestone::Operational);
    }

    #[test]
    fn test_overlapping_periods_are_not_conflicts() {
        let labeled = vec![
            (Milestone::UnderConstruction, "2025".to_string()),
            (Milestone::Operational, "Q2 2025".to_string()),
        ];
        let timeline = TimelineExtractor::default().assemble(&labeled, "");
        assert!(!timeline.has_conflicts());
    }

    #[test]
    fn test_labeled_wins_over_context() {
        let labeled = vec![(Milestone::Operational, "COD: Q4 2026".to_string())];
        let timeline = TimelineExtractor::default()
            .assemble(&labeled, "The plant is expected to be operational in 2027.");
        let event = timeline.get(Milestone::Operational).unwrap();
        assert_eq!(event.source, EventSource::Labeled);
        assert_eq!(event.date.to_string(), "2026-Q4");
    }

    #[test]
    fn test_milestone_field_mapping() {
        for milestone in Milestone::ALL {
            assert_eq!(Milestone::from_field(milestone.field()), Some(milestone));
        }
        assert_eq!(Milestone::from_field(Field::Developer), None);
    }
}
