// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

use kumite_log::{
    export_to_file, Actor, AnalysisFilter, AnalysisReport, Config, MatchRecord, MatchType,
    MatchTypeFilter, NameRegistry, PenaltyCategory, Period, QuoteStyle, RecordStore, SqliteStore,
    UserInfo,
};

#[derive(Parser, Debug)]
#[command(name = "kumite-log", version, about = "Record and analyse karate kumite bouts")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true, env = "KUMITE_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database (overrides the config file)
    #[arg(long, global = true, env = "KUMITE_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args, Debug, Clone)]
struct MatchInfoArgs {
    /// Bout date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    date: Option<NaiveDate>,

    /// practice / tournament (練習 / 大会)
    #[arg(long = "type", default_value = "practice")]
    match_type: MatchType,

    #[arg(long)]
    tournament: Option<String>,

    #[arg(long)]
    opponent: Option<String>,
}

/// Corrections applied to a saved bout before it is re-opened
#[derive(Args, Debug, Clone, Default)]
struct MatchInfoOverrides {
    /// New bout date (YYYY-MM-DD)
    #[arg(long)]
    date: Option<NaiveDate>,

    /// practice / tournament (練習 / 大会)
    #[arg(long = "type")]
    match_type: Option<MatchType>,

    /// New tournament name, "" clears it
    #[arg(long)]
    tournament: Option<String>,

    /// New opponent name, "" clears it
    #[arg(long)]
    opponent: Option<String>,
}

#[cfg(feature = "tui")]
impl MatchInfoOverrides {
    fn apply(self, session: &mut kumite_log::RecordingSession) {
        if let Some(date) = self.date {
            session.set_date(date);
        }
        if let Some(match_type) = self.match_type {
            session.set_match_type(match_type);
        }
        if let Some(name) = self.tournament {
            session.set_tournament_name(Some(name));
        }
        if let Some(name) = self.opponent {
            session.set_opponent_name(Some(name));
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show or update the user profile
    #[command(alias = "settings")]
    Setup {
        #[arg(long)]
        name: Option<String>,

        /// YYYY-MM-DD
        #[arg(long)]
        birth_date: Option<NaiveDate>,
    },

    /// Record a new bout on the live scoring screen
    Record(MatchInfoArgs),

    /// Re-open a saved bout on the scoring screen
    Edit {
        id: String,

        #[command(flatten)]
        overrides: MatchInfoOverrides,
    },

    /// List saved bouts, newest first
    List,

    /// Show one bout in detail
    Show { id: String },

    /// Delete a bout
    Delete { id: String },

    /// Technique distribution, frequency ranking and penalty rates
    Analyze {
        /// all / practice / tournament
        #[arg(long = "type", default_value = "all")]
        match_type: MatchTypeFilter,

        /// all / recent (last 10 bouts)
        #[arg(long, default_value = "all")]
        period: Period,

        /// Range start, inclusive (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Range end, inclusive (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write every bout to karate_records_{date}.csv
    Export {
        /// Output directory (overrides the config file)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Never quote fields
        #[arg(long)]
        legacy: bool,
    },

    /// Opponent and tournament names seen so far
    Names {
        /// Only names containing this text (case-insensitive)
        filter: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(kumite_log::config::env_filter(LevelFilter::WARN))
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let db_path = cli.db.clone().unwrap_or_else(|| config.storage.db_path.clone());

    let store = SqliteStore::open(&db_path)?;
    let mut store = RecordStore::new(store);
    let today = Local::now().date_naive();

    match cli.command.unwrap_or(Command::List) {
        Command::Setup { name, birth_date } => run_setup(&mut store, name, birth_date, today)?,
        Command::Record(info) => {
            print_name_hints(&store, info.opponent.as_deref(), info.tournament.as_deref())?;
            run_record(store, &config, info, today)?
        }
        Command::Edit { id, overrides } => {
            print_name_hints(
                &store,
                overrides.opponent.as_deref(),
                overrides.tournament.as_deref(),
            )?;
            run_edit(store, &config, &id, overrides)?
        }
        Command::List => run_list(&store)?,
        Command::Show { id } => run_show(&store, &id)?,
        Command::Delete { id } => run_delete(&mut store, &id)?,
        Command::Analyze {
            match_type,
            period,
            start,
            end,
            json,
        } => {
            let period = if start.is_some() || end.is_some() {
                Period::range(start, end)
            } else {
                period
            };
            run_analyze(&store, AnalysisFilter::new(match_type, period), json)?
        }
        Command::Export { output, legacy } => {
            let dir = output.unwrap_or_else(|| config.export.output_dir.clone());
            let style = if legacy {
                QuoteStyle::Legacy
            } else {
                config.export.quote_style
            };
            run_export(&store, &dir, style, today)?
        }
        Command::Names { filter } => run_names(&store, filter.as_deref())?,
    }

    Ok(())
}

fn run_setup(
    store: &mut RecordStore<SqliteStore>,
    name: Option<String>,
    birth_date: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<()> {
    let current = store.user_info()?;

    if name.is_none() && birth_date.is_none() {
        match current {
            Some(user) => println!("👤 {}", user.refreshed(today).headline()),
            None => {
                println!("👤 No profile yet");
                println!("   Run: kumite-log setup --name <NAME> --birth-date <YYYY-MM-DD>");
            }
        }
        return Ok(());
    }

    let name = match name.or_else(|| current.as_ref().map(|u| u.name.clone())) {
        Some(n) if !n.trim().is_empty() => n,
        _ => bail!("a name is required (--name)"),
    };
    let Some(birth_date) = birth_date.or_else(|| current.as_ref().map(|u| u.birth_date)) else {
        bail!("a birth date is required (--birth-date)");
    };

    let user = UserInfo::new(name, birth_date, today);
    store.save_user_info(&user)?;
    println!("✓ Profile saved: {}", user.headline());
    Ok(())
}

#[cfg(feature = "tui")]
fn run_record(
    store: RecordStore<SqliteStore>,
    config: &Config,
    info: MatchInfoArgs,
    today: NaiveDate,
) -> Result<()> {
    use kumite_log::{MatchInfo, RecordingSession, SystemClock};

    let match_info = MatchInfo::new(info.date.unwrap_or(today))
        .with_match_type(info.match_type)
        .with_tournament(info.tournament)
        .with_opponent(info.opponent);

    let session = RecordingSession::start(&store, match_info, Box::new(SystemClock))?
        .with_undo_window(config.session.undo_window());

    run_session(session, store)
}

#[cfg(feature = "tui")]
fn run_edit(
    store: RecordStore<SqliteStore>,
    config: &Config,
    id: &str,
    overrides: MatchInfoOverrides,
) -> Result<()> {
    use kumite_log::{RecordingSession, SystemClock};

    let record = store
        .match_record(id)?
        .with_context(|| format!("No record with id {}", id))?;

    let mut session = RecordingSession::edit(record, Box::new(SystemClock))
        .with_undo_window(config.session.undo_window());
    overrides.apply(&mut session);

    run_session(session, store)
}

#[cfg(feature = "tui")]
fn run_session(
    session: kumite_log::RecordingSession,
    store: RecordStore<SqliteStore>,
) -> Result<()> {
    use kumite_log::FlushOutcome;

    let mut app = ui::App::new(session, store);
    let outcome = ui::run_ui(&mut app)?;

    match outcome {
        FlushOutcome::Saved(record) => {
            println!("✅ Saved {}", record.id);
            print_record(&record);
        }
        FlushOutcome::Discarded => println!("✓ Session closed, nothing to save"),
        FlushOutcome::Blocked => println!("⚠️  Session closed with an unsaved draft"),
    }
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_record(
    _store: RecordStore<SqliteStore>,
    _config: &Config,
    _info: MatchInfoArgs,
    _today: NaiveDate,
) -> Result<()> {
    tui_unavailable()
}

#[cfg(not(feature = "tui"))]
fn run_edit(
    _store: RecordStore<SqliteStore>,
    _config: &Config,
    _id: &str,
    _overrides: MatchInfoOverrides,
) -> Result<()> {
    tui_unavailable()
}

#[cfg(not(feature = "tui"))]
fn tui_unavailable() -> Result<()> {
    eprintln!("❌ Recording screen not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    std::process::exit(1);
}

/// Registry names resembling `name` when it is not already a known name
fn similar_names<'a>(registry: &'a NameRegistry, name: &str) -> Vec<&'a str> {
    if name.trim().is_empty() || registry.contains(name) {
        return Vec::new();
    }
    registry.suggest(name)
}

fn print_name_hints(
    store: &RecordStore<SqliteStore>,
    opponent: Option<&str>,
    tournament: Option<&str>,
) -> Result<()> {
    let opponents = store.opponents()?;
    let tournaments = store.tournaments()?;

    for (label, registry, name) in [
        ("opponents", &opponents, opponent),
        ("tournaments", &tournaments, tournament),
    ] {
        let Some(name) = name else { continue };
        let similar = similar_names(registry, name);
        if !similar.is_empty() {
            println!("💡 \"{}\" is new; known {}: {}", name, label, similar.join(", "));
        }
    }
    Ok(())
}

fn run_list(store: &RecordStore<SqliteStore>) -> Result<()> {
    let records = store.records_newest_first()?;

    if records.is_empty() {
        println!("📭 No bouts recorded yet");
        println!("   Run: kumite-log record --opponent <NAME>");
        return Ok(());
    }

    println!("🥋 {} bouts", records.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for record in &records {
        let board = record.scoreboard();
        println!(
            "{}  {}  {:>7} - {:<7}  {}{}  [{}]",
            record.date,
            record.match_type,
            board.display(Actor::Me),
            board.display(Actor::Opponent),
            record.opponent_name.as_deref().unwrap_or("-"),
            record
                .tournament_name
                .as_deref()
                .map(|t| format!(" @ {}", t))
                .unwrap_or_default(),
            record.id,
        );
    }
    Ok(())
}

fn print_record(record: &MatchRecord) {
    let board = record.scoreboard();

    println!("📅 {}  {}", record.date, record.match_type);
    if let Some(tournament) = &record.tournament_name {
        println!("🏆 {}", tournament);
    }
    if let Some(opponent) = &record.opponent_name {
        println!("🆚 {}", opponent);
    }
    println!(
        "   {}({}) {}  -  {} {}({})",
        Actor::Me,
        record.color_of(Actor::Me).as_str(),
        board.display(Actor::Me),
        board.display(Actor::Opponent),
        Actor::Opponent,
        record.color_of(Actor::Opponent).as_str(),
    );

    for (i, t) in record.techniques.iter().enumerate() {
        println!("   {:>2}. {}", i + 1, t.summary());
    }
    for actor in Actor::ALL {
        let tally: Vec<String> = PenaltyCategory::ALL
            .iter()
            .map(|&c| (c, record.penalty_count(actor, c)))
            .filter(|&(_, n)| n > 0)
            .map(|(c, n)| format!("{}:{}", c.short(), n))
            .collect();
        if !tally.is_empty() {
            println!("   ⚠️  {} 反則 {}", actor, tally.join(" "));
        }
    }
}

fn run_show(store: &RecordStore<SqliteStore>, id: &str) -> Result<()> {
    let record = store
        .match_record(id)?
        .with_context(|| format!("No record with id {}", id))?;
    print_record(&record);
    Ok(())
}

fn run_delete(store: &mut RecordStore<SqliteStore>, id: &str) -> Result<()> {
    if store.delete_match_record(id)? {
        println!("🗑️  Deleted {}", id);
        Ok(())
    } else {
        bail!("No record with id {}", id)
    }
}

fn run_analyze(store: &RecordStore<SqliteStore>, filter: AnalysisFilter, json: bool) -> Result<()> {
    let records = store.records_newest_first()?;
    let report = AnalysisReport::build(&records, &filter);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("📊 Analysis over {} bouts", report.record_count);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!("\n🎯 Score distribution");
    if report.score_distribution.is_empty() {
        println!("   (no techniques)");
    }
    for share in &report.score_distribution {
        println!("   {:<24} {:>3} pts", share.label, share.points);
    }

    println!("\n🔁 Technique frequency (top 10)");
    for (i, entry) in report.technique_frequency.iter().enumerate() {
        println!("   {:>2}. {:<20} {}", i + 1, entry.label, entry.count);
    }

    println!("\n⚠️  Penalties per bout");
    println!("   {}: {:.2}", PenaltyCategory::Category1, report.penalty_rate.category1);
    println!("   {}: {:.2}", PenaltyCategory::Category2, report.penalty_rate.category2);

    Ok(())
}

fn run_export(
    store: &RecordStore<SqliteStore>,
    dir: &std::path::Path,
    style: QuoteStyle,
    today: NaiveDate,
) -> Result<()> {
    let records = store.records_newest_first()?;
    let path = export_to_file(dir, &records, style, today)?;
    println!("📄 Exported {} bouts to {}", records.len(), path.display());
    Ok(())
}

fn run_names(store: &RecordStore<SqliteStore>, filter: Option<&str>) -> Result<()> {
    let opponents = store.opponents()?;
    let tournaments = store.tournaments()?;

    for (icon, label, registry) in [
        ("🆚", "Opponents", &opponents),
        ("🏆", "Tournaments", &tournaments),
    ] {
        let names: Vec<&str> = match filter {
            Some(fragment) => registry.suggest(fragment),
            None => registry.names().iter().map(String::as_str).collect(),
        };

        println!("{} {} ({})", icon, label, names.len());
        for name in names {
            println!("   {}", name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_similar_names_skip_exact_and_blank() {
        let registry = NameRegistry::from_names(vec![
            "Tanaka".to_string(),
            "Tanabe".to_string(),
            "Sato".to_string(),
        ]);

        assert_eq!(similar_names(&registry, "tana"), vec!["Tanaka", "Tanabe"]);
        assert!(similar_names(&registry, "Tanaka").is_empty());
        assert!(similar_names(&registry, "  ").is_empty());
        assert!(similar_names(&registry, "Suzuki").is_empty());
    }

    #[test]
    fn test_edit_accepts_match_info_overrides() {
        let cli = Cli::try_parse_from([
            "kumite-log",
            "edit",
            "m1",
            "--date",
            "2024-05-02",
            "--opponent",
            "Tanaka",
            "--tournament",
            "",
        ])
        .unwrap();

        let Some(Command::Edit { id, overrides }) = cli.command else {
            panic!("expected the edit subcommand");
        };
        assert_eq!(id, "m1");
        assert_eq!(overrides.date, Some(date(2024, 5, 2)));
        assert_eq!(overrides.opponent.as_deref(), Some("Tanaka"));
        assert_eq!(overrides.tournament.as_deref(), Some(""));
        assert_eq!(overrides.match_type, None);
    }

    #[cfg(feature = "tui")]
    #[test]
    fn test_overrides_correct_a_saved_bout() {
        use kumite_log::{
            ManualClock, MatchInfo, MemoryStore, Point, RecordingSession, TargetArea,
            TechniqueType,
        };

        let clock = ManualClock::new(chrono::Utc::now());
        let mut store = RecordStore::new(MemoryStore::new());

        let info = MatchInfo::new(date(2024, 5, 1))
            .with_opponent(Some("Tanka".to_string()))
            .with_tournament(Some("県大会".to_string()));
        let mut session = RecordingSession::new(info, false, Box::new(clock.clone()));
        session.choose_actor(Actor::Me).unwrap();
        session.choose_technique(TechniqueType::Tsuki).unwrap();
        session.choose_area(TargetArea::Jodan).unwrap();
        session.choose_point(Point::ONE).unwrap();
        let saved = session.save(&mut store).unwrap();

        let mut editor = RecordingSession::edit(saved.clone(), Box::new(clock));
        MatchInfoOverrides {
            date: Some(date(2024, 5, 2)),
            match_type: None,
            tournament: Some(String::new()),
            opponent: Some("Tanaka".to_string()),
        }
        .apply(&mut editor);
        editor.save(&mut store).unwrap();

        let fixed = store.match_record(&saved.id).unwrap().unwrap();
        assert_eq!(fixed.date, date(2024, 5, 2));
        assert_eq!(fixed.opponent_name.as_deref(), Some("Tanaka"));
        assert_eq!(fixed.tournament_name, None);
        assert_eq!(fixed.techniques[0].date, date(2024, 5, 2));
        assert_eq!(fixed.match_type, MatchType::Practice);
        assert!(store.opponents().unwrap().contains("Tanaka"));
        assert_eq!(store.all_match_records().unwrap().len(), 1);
    }
}
