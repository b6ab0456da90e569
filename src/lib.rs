// Kumite Log - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod entities;       // Data model: bouts, profile, name registries
pub mod storage;        // Key-value capability (memory + SQLite)
pub mod record_store;   // Typed collections over the key-value store
pub mod session;        // Live recording: entry wizard, undo window, save/flush
pub mod analysis;       // Filters + aggregates over saved bouts
pub mod export;         // CSV export
pub mod config;         // TOML configuration

// Re-export commonly used types
pub use entities::{
    Actor, MatchRecord, MatchType, PenaltyCategory, PenaltyRecord, Point, Scoreboard,
    SideColor, TargetArea, TechniqueRecord, TechniqueType,
    UserInfo, calculate_age, calculate_grade,
    NameRegistry,
};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore, setup_database};
pub use record_store::RecordStore;
pub use session::{
    Clock, SystemClock, ManualClock,
    RecordingSession, MatchInfo, EntryStep, Notification, FlushOutcome, SessionError,
    DEFAULT_UNDO_WINDOW_MS, MAX_UNDO_WINDOW_MS,
};
pub use analysis::{
    AnalysisFilter, AnalysisReport, MatchTypeFilter, Period,
    ScoreShare, FrequencyEntry, PenaltyRate,
    score_distribution, technique_frequency, penalty_rate,
};
pub use export::{
    QuoteStyle, CSV_HEADERS, to_csv_string, write_csv, export_filename, export_to_file,
};
pub use config::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
