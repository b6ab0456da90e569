// 🥋 Bout Entities - what happens on the mat
//
// Every label below is the Japanese term the browser version of the
// recorder persisted, so JSON written by either side reads back unchanged.
//
// - Techniques and penalties are immutable once drafted
// - A MatchRecord only changes through an explicit replace-by-id
// - Senshu is a priority marker, never a technique

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ACTOR
// ============================================================================

/// Which side of the bout an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Actor {
    /// The user doing the recording
    #[serde(rename = "自分")]
    Me,

    #[serde(rename = "相手")]
    Opponent,
}

impl Actor {
    pub const ALL: [Actor; 2] = [Actor::Me, Actor::Opponent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Actor::Me => "自分",
            Actor::Opponent => "相手",
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TECHNIQUE / AREA / POINT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TechniqueType {
    /// Thrust
    #[serde(rename = "突き")]
    Tsuki,

    /// Kick
    #[serde(rename = "蹴り")]
    Geri,

    /// Takedown
    #[serde(rename = "こかし")]
    Kokashi,
}

impl TechniqueType {
    pub const ALL: [TechniqueType; 3] = [
        TechniqueType::Tsuki,
        TechniqueType::Geri,
        TechniqueType::Kokashi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TechniqueType::Tsuki => "突き",
            TechniqueType::Geri => "蹴り",
            TechniqueType::Kokashi => "こかし",
        }
    }

    /// Kokashi skips the area choice
    pub fn needs_area(&self) -> bool {
        !matches!(self, TechniqueType::Kokashi)
    }

    /// Sub-technique recorded alongside a takedown (always the finishing thrust)
    pub fn implied_sub_technique(&self) -> Option<TechniqueType> {
        match self {
            TechniqueType::Kokashi => Some(TechniqueType::Tsuki),
            _ => None,
        }
    }
}

impl fmt::Display for TechniqueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetArea {
    /// Upper level (head/face)
    #[serde(rename = "上段")]
    Jodan,

    /// Middle level (body)
    #[serde(rename = "中段")]
    Chudan,
}

impl TargetArea {
    pub const ALL: [TargetArea; 2] = [TargetArea::Jodan, TargetArea::Chudan];

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetArea::Jodan => "上段",
            TargetArea::Chudan => "中段",
        }
    }
}

impl Default for TargetArea {
    fn default() -> Self {
        TargetArea::Chudan
    }
}

impl fmt::Display for TargetArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Points awarded for one technique: 1 (yuko), 2 (waza-ari) or 3 (ippon)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Point(u8);

impl Point {
    pub const ONE: Point = Point(1);
    pub const TWO: Point = Point(2);
    pub const THREE: Point = Point(3);
    pub const ALL: [Point; 3] = [Point::ONE, Point::TWO, Point::THREE];

    pub fn new(value: u8) -> Result<Self, String> {
        match value {
            1..=3 => Ok(Point(value)),
            other => Err(format!("point must be 1, 2 or 3 (got {})", other)),
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Point {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Point::new(value)
    }
}

impl From<Point> for u8 {
    fn from(point: Point) -> u8 {
        point.0
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// PENALTIES / MATCH TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PenaltyCategory {
    #[serde(rename = "カテゴリ1")]
    Category1,

    #[serde(rename = "カテゴリ2")]
    Category2,
}

impl PenaltyCategory {
    pub const ALL: [PenaltyCategory; 2] = [PenaltyCategory::Category1, PenaltyCategory::Category2];

    pub fn as_str(&self) -> &'static str {
        match self {
            PenaltyCategory::Category1 => "カテゴリ1",
            PenaltyCategory::Category2 => "カテゴリ2",
        }
    }

    /// Compact form used on the scoreboard ("C1"/"C2")
    pub fn short(&self) -> &'static str {
        match self {
            PenaltyCategory::Category1 => "C1",
            PenaltyCategory::Category2 => "C2",
        }
    }
}

impl fmt::Display for PenaltyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchType {
    #[serde(rename = "練習")]
    Practice,

    #[serde(rename = "大会")]
    Tournament,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Practice => "練習",
            MatchType::Tournament => "大会",
        }
    }

    pub fn toggled(&self) -> MatchType {
        match self {
            MatchType::Practice => MatchType::Tournament,
            MatchType::Tournament => MatchType::Practice,
        }
    }
}

impl Default for MatchType {
    fn default() -> Self {
        MatchType::Practice
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "practice" | "練習" => Ok(MatchType::Practice),
            "tournament" | "大会" => Ok(MatchType::Tournament),
            other => Err(format!("unknown match type: {}", other)),
        }
    }
}

// ============================================================================
// SIDE COLORS
// ============================================================================

/// Belt/scoreboard color shown for a side (presentation only)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideColor {
    Blue,
    Red,
}

impl SideColor {
    /// Default is Me = blue, Opponent = red; `swapped` flips both
    pub fn for_actor(actor: Actor, swapped: bool) -> SideColor {
        match (actor, swapped) {
            (Actor::Me, false) | (Actor::Opponent, true) => SideColor::Blue,
            (Actor::Opponent, false) | (Actor::Me, true) => SideColor::Red,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SideColor::Blue => "青",
            SideColor::Red => "赤",
        }
    }
}

// ============================================================================
// RECORDS
// ============================================================================

/// One scoring technique
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechniqueRecord {
    pub match_id: String,
    pub date: NaiveDate,
    pub match_type: MatchType,

    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub tournament_name: Option<String>,

    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub opponent_name: Option<String>,

    pub actor: Actor,
    pub technique: TechniqueType,

    /// Only set for Kokashi
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_technique: Option<TechniqueType>,

    pub area: TargetArea,
    pub point: Point,
}

impl TechniqueRecord {
    /// "中段突き"
    pub fn label(&self) -> String {
        format!("{}{}", self.area, self.technique)
    }

    /// "中段突き2点自分" - the export form
    pub fn summary(&self) -> String {
        format!("{}{}{}点{}", self.area, self.technique, self.point, self.actor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PenaltyRecord {
    pub match_id: String,
    pub actor: Actor,
    pub category: PenaltyCategory,
}

/// A completed bout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub id: String,
    pub date: NaiveDate,
    pub match_type: MatchType,

    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub tournament_name: Option<String>,

    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub opponent_name: Option<String>,

    #[serde(default)]
    pub techniques: Vec<TechniqueRecord>,

    #[serde(default)]
    pub penalties: Vec<PenaltyRecord>,

    #[serde(default)]
    pub senshu: Option<Actor>,

    /// Color assignment in effect when the bout was recorded.
    /// Records written before the preference existed default to false.
    #[serde(default)]
    pub colors_swapped: bool,
}

impl MatchRecord {
    pub fn score(&self, actor: Actor) -> u32 {
        score_of(&self.techniques, actor)
    }

    pub fn penalty_count(&self, actor: Actor, category: PenaltyCategory) -> usize {
        penalty_count_of(&self.penalties, actor, category)
    }

    pub fn scoreboard(&self) -> Scoreboard {
        Scoreboard {
            me: self.score(Actor::Me),
            opponent: self.score(Actor::Opponent),
            senshu: self.senshu,
        }
    }

    pub fn color_of(&self, actor: Actor) -> SideColor {
        SideColor::for_actor(actor, self.colors_swapped)
    }

    pub fn tournament(&self) -> &str {
        self.tournament_name.as_deref().unwrap_or("")
    }

    pub fn opponent(&self) -> &str {
        self.opponent_name.as_deref().unwrap_or("")
    }
}

/// Sum of points for one side
pub fn score_of<'a, I>(techniques: I, actor: Actor) -> u32
where
    I: IntoIterator<Item = &'a TechniqueRecord>,
{
    techniques
        .into_iter()
        .filter(|t| t.actor == actor)
        .map(|t| t.point.value() as u32)
        .sum()
}

pub fn penalty_count_of<'a, I>(penalties: I, actor: Actor, category: PenaltyCategory) -> usize
where
    I: IntoIterator<Item = &'a PenaltyRecord>,
{
    penalties
        .into_iter()
        .filter(|p| p.actor == actor && p.category == category)
        .count()
}

/// Blank or whitespace-only names are treated as absent
pub fn non_blank(name: Option<String>) -> Option<String> {
    name.filter(|n| !n.trim().is_empty())
}

// Browser data stores an untouched name field as ""
fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(non_blank)
}

// ============================================================================
// SCOREBOARD
// ============================================================================

/// Integer scores plus the senshu holder, which is reported separately
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Scoreboard {
    pub me: u32,
    pub opponent: u32,
    pub senshu: Option<Actor>,
}

impl Scoreboard {
    pub const SENSHU_BONUS: f64 = 0.1;

    pub fn score(&self, actor: Actor) -> u32 {
        match actor {
            Actor::Me => self.me,
            Actor::Opponent => self.opponent,
        }
    }

    /// "3" or "3 (+0.1)"
    pub fn display(&self, actor: Actor) -> String {
        if self.senshu == Some(actor) {
            format!("{} (+{})", self.score(actor), Self::SENSHU_BONUS)
        } else {
            self.score(actor).to_string()
        }
    }

    pub fn is_scoreless(&self) -> bool {
        self.me == 0 && self.opponent == 0
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn technique(
        actor: Actor,
        technique: TechniqueType,
        area: TargetArea,
        point: u8,
    ) -> TechniqueRecord {
        TechniqueRecord {
            match_id: "m1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 5, 12).unwrap(),
            match_type: MatchType::Practice,
            tournament_name: None,
            opponent_name: None,
            actor,
            technique,
            sub_technique: technique.implied_sub_technique(),
            area,
            point: Point::new(point).unwrap(),
        }
    }

    #[test]
    fn test_point_range() {
        assert!(Point::new(0).is_err());
        assert!(Point::new(4).is_err());
        assert_eq!(Point::new(3).unwrap(), Point::THREE);

        let bad: Result<Point, _> = serde_json::from_str("5");
        assert!(bad.is_err());
        let good: Point = serde_json::from_str("2").unwrap();
        assert_eq!(good.value(), 2);
    }

    #[test]
    fn test_labels_match_persisted_form() {
        let t = technique(Actor::Me, TechniqueType::Tsuki, TargetArea::Chudan, 2);
        assert_eq!(t.summary(), "中段突き2点自分");
        assert_eq!(t.label(), "中段突き");

        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["actor"], "自分");
        assert_eq!(json["technique"], "突き");
        assert_eq!(json["area"], "中段");
        assert_eq!(json["matchType"], "練習");
        assert_eq!(json["date"], "2024-05-12");
        assert!(json.get("subTechnique").is_none());
    }

    #[test]
    fn test_reads_browser_record_without_color_flag() {
        let raw = r#"{
            "id": "1715500000000",
            "date": "2024-05-12",
            "matchType": "大会",
            "tournamentName": "県大会",
            "opponentName": "",
            "techniques": [{
                "matchId": "1715500000001",
                "date": "2024-05-12",
                "matchType": "大会",
                "actor": "相手",
                "technique": "こかし",
                "subTechnique": "突き",
                "area": "中段",
                "point": 3
            }],
            "penalties": [{"matchId": "1715500000002", "actor": "自分", "category": "カテゴリ2"}],
            "senshu": null
        }"#;

        let record: MatchRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.match_type, MatchType::Tournament);
        assert_eq!(record.tournament_name.as_deref(), Some("県大会"));
        assert_eq!(record.opponent_name, None);
        assert!(!record.colors_swapped);
        assert_eq!(record.senshu, None);
        assert_eq!(record.score(Actor::Opponent), 3);
        assert_eq!(record.techniques[0].sub_technique, Some(TechniqueType::Tsuki));
        assert_eq!(record.penalty_count(Actor::Me, PenaltyCategory::Category2), 1);
    }

    #[test]
    fn test_scoreboard_senshu_is_separate() {
        let record = MatchRecord {
            id: "m1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 5, 12).unwrap(),
            match_type: MatchType::Practice,
            tournament_name: None,
            opponent_name: None,
            techniques: vec![
                technique(Actor::Me, TechniqueType::Tsuki, TargetArea::Chudan, 1),
                technique(Actor::Opponent, TechniqueType::Geri, TargetArea::Jodan, 1),
            ],
            penalties: vec![],
            senshu: Some(Actor::Me),
            colors_swapped: false,
        };

        let board = record.scoreboard();
        assert_eq!(board.me, 1);
        assert_eq!(board.opponent, 1);
        assert_eq!(board.display(Actor::Me), "1 (+0.1)");
        assert_eq!(board.display(Actor::Opponent), "1");
    }

    #[test]
    fn test_side_colors_swap() {
        assert_eq!(SideColor::for_actor(Actor::Me, false), SideColor::Blue);
        assert_eq!(SideColor::for_actor(Actor::Opponent, false), SideColor::Red);
        assert_eq!(SideColor::for_actor(Actor::Me, true), SideColor::Red);
        assert_eq!(SideColor::for_actor(Actor::Opponent, true), SideColor::Blue);
    }

    #[test]
    fn test_match_type_parsing() {
        assert_eq!("practice".parse::<MatchType>().unwrap(), MatchType::Practice);
        assert_eq!("大会".parse::<MatchType>().unwrap(), MatchType::Tournament);
        assert!("friendly".parse::<MatchType>().is_err());
    }
}
