// 📊 Analysis Engine - aggregates over saved bouts
//
// Pure functions over a caller-supplied record list. Nothing here reads the
// store; callers decide the ordering ("recent" takes the first N of whatever
// order it is given, so pass `records_newest_first()` for the usual meaning).

use crate::entities::{MatchRecord, MatchType, PenaltyCategory, TargetArea, TechniqueType};
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;
use std::str::FromStr;

/// How many records the "recent" period keeps
pub const RECENT_MATCH_COUNT: usize = 10;

/// Length of the technique frequency ranking
pub const FREQUENCY_TOP_N: usize = 10;

// ============================================================================
// FILTERS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchTypeFilter {
    #[default]
    All,
    Only(MatchType),
}

impl MatchTypeFilter {
    pub fn matches(&self, record: &MatchRecord) -> bool {
        match self {
            MatchTypeFilter::All => true,
            MatchTypeFilter::Only(match_type) => record.match_type == *match_type,
        }
    }
}

impl FromStr for MatchTypeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" | "すべて" => Ok(MatchTypeFilter::All),
            other => other.parse::<MatchType>().map(MatchTypeFilter::Only),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    #[default]
    AllTime,
    /// First `RECENT_MATCH_COUNT` records of the type-filtered list
    Recent,
    /// Inclusive on both ends; a missing bound is open
    Range {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

impl Period {
    pub fn range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Period::Range { start, end }
    }

    fn contains(start: Option<NaiveDate>, end: Option<NaiveDate>, date: NaiveDate) -> bool {
        start.map_or(true, |s| date >= s) && end.map_or(true, |e| date <= e)
    }
}

/// Parses "all" and "recent"; ranges are built with `Period::range`
impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" => Ok(Period::AllTime),
            "recent" => Ok(Period::Recent),
            "custom" | "range" => Ok(Period::range(None, None)),
            other => Err(format!("unknown period: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnalysisFilter {
    pub match_type: MatchTypeFilter,
    pub period: Period,
}

impl AnalysisFilter {
    pub fn new(match_type: MatchTypeFilter, period: Period) -> Self {
        AnalysisFilter { match_type, period }
    }

    /// Match type first, then period over the type-filtered list
    pub fn apply<'a>(&self, records: &'a [MatchRecord]) -> Vec<&'a MatchRecord> {
        let typed = records.iter().filter(|r| self.match_type.matches(r));

        match self.period {
            Period::AllTime => typed.collect(),
            Period::Recent => typed.take(RECENT_MATCH_COUNT).collect(),
            Period::Range { start, end } => typed
                .filter(|r| Period::contains(start, end, r.date))
                .collect(),
        }
    }
}

// ============================================================================
// SCORE DISTRIBUTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreShare {
    pub technique: TechniqueType,
    pub area: TargetArea,
    pub points: u32,
    /// Percentage of all points, one decimal
    pub percentage: f64,
    /// "突き - 中段 (40.0%)"
    pub label: String,
}

/// Points per (technique, area), in first-encountered order
pub fn score_distribution(records: &[&MatchRecord]) -> Vec<ScoreShare> {
    let mut groups: IndexMap<(TechniqueType, TargetArea), u32> = IndexMap::new();

    for technique in records.iter().flat_map(|r| &r.techniques) {
        *groups.entry((technique.technique, technique.area)).or_insert(0) +=
            technique.point.value() as u32;
    }

    let total: u32 = groups.values().sum();

    groups
        .into_iter()
        .map(|((technique, area), points)| {
            let percentage = if total > 0 {
                round_to(points as f64 / total as f64 * 100.0, 1)
            } else {
                0.0
            };
            ScoreShare {
                technique,
                area,
                points,
                percentage,
                label: format!("{} - {} ({:.1}%)", technique, area, percentage),
            }
        })
        .collect()
}

// ============================================================================
// TECHNIQUE FREQUENCY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrequencyEntry {
    /// "こかし (突き) - 中段"
    pub label: String,
    pub count: usize,
}

/// Occurrence counts, most used first, top `FREQUENCY_TOP_N`.
/// Ties keep first-encountered order.
pub fn technique_frequency(records: &[&MatchRecord]) -> Vec<FrequencyEntry> {
    let mut counts: IndexMap<String, usize> = IndexMap::new();

    for technique in records.iter().flat_map(|r| &r.techniques) {
        let label = match technique.sub_technique {
            Some(sub) => format!("{} ({}) - {}", technique.technique, sub, technique.area),
            None => format!("{} - {}", technique.technique, technique.area),
        };
        *counts.entry(label).or_insert(0) += 1;
    }

    let mut ranking: Vec<FrequencyEntry> = counts
        .into_iter()
        .map(|(label, count)| FrequencyEntry { label, count })
        .collect();

    // sort_by is stable
    ranking.sort_by(|a, b| b.count.cmp(&a.count));
    ranking.truncate(FREQUENCY_TOP_N);
    ranking
}

// ============================================================================
// PENALTY RATE
// ============================================================================

/// Average penalties per bout, two decimals
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PenaltyRate {
    pub category1: f64,
    pub category2: f64,
}

impl PenaltyRate {
    pub fn get(&self, category: PenaltyCategory) -> f64 {
        match category {
            PenaltyCategory::Category1 => self.category1,
            PenaltyCategory::Category2 => self.category2,
        }
    }
}

/// Both sides' penalties count. An empty list gives zero for both.
pub fn penalty_rate(records: &[&MatchRecord]) -> PenaltyRate {
    if records.is_empty() {
        return PenaltyRate {
            category1: 0.0,
            category2: 0.0,
        };
    }

    let bouts = records.len() as f64;
    let rate = |category: PenaltyCategory| {
        let count = records
            .iter()
            .flat_map(|r| &r.penalties)
            .filter(|p| p.category == category)
            .count();
        round_to(count as f64 / bouts, 2)
    };

    PenaltyRate {
        category1: rate(PenaltyCategory::Category1),
        category2: rate(PenaltyCategory::Category2),
    }
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub record_count: usize,
    pub score_distribution: Vec<ScoreShare>,
    pub technique_frequency: Vec<FrequencyEntry>,
    pub penalty_rate: PenaltyRate,
}

impl AnalysisReport {
    pub fn build(records: &[MatchRecord], filter: &AnalysisFilter) -> Self {
        let selected = filter.apply(records);

        AnalysisReport {
            record_count: selected.len(),
            score_distribution: score_distribution(&selected),
            technique_frequency: technique_frequency(&selected),
            penalty_rate: penalty_rate(&selected),
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// ============================================================================
// TESTS
// ============================================================================
