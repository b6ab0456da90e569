// Entity Models
//
// - bout: techniques, penalties, match records and their labels
// - profile: the single user profile with derived age/grade
// - registry: append-only opponent/tournament name sets

pub mod bout;
pub mod profile;
pub mod registry;

pub use bout::{
    non_blank, penalty_count_of, score_of, Actor, MatchRecord, MatchType, PenaltyCategory,
    PenaltyRecord, Point, Scoreboard, SideColor, TargetArea, TechniqueRecord, TechniqueType,
};
pub use profile::{calculate_age, calculate_grade, UserInfo};
pub use registry::NameRegistry;
