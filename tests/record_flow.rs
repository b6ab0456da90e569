// End-to-end: record bouts through a session, persist them in SQLite,
// then read them back for analysis and export.

use chrono::{Duration, NaiveDate, Utc};
use kumite_log::{
    to_csv_string, Actor, AnalysisFilter, AnalysisReport, FlushOutcome, ManualClock, MatchInfo,
    MatchType, MatchTypeFilter, PenaltyCategory, Period, Point, QuoteStyle, RecordStore,
    RecordingSession, SessionError, SqliteStore, TargetArea, TechniqueType, CSV_HEADERS,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn technique(
    session: &mut RecordingSession,
    actor: Actor,
    technique: TechniqueType,
    area: TargetArea,
    point: Point,
) {
    session.choose_actor(actor).unwrap();
    session.choose_technique(technique).unwrap();
    if technique.needs_area() {
        session.choose_area(area).unwrap();
    }
    session.choose_point(point).unwrap();
}

#[test]
fn test_record_store_analyse_export() {
    let mut store = RecordStore::new(SqliteStore::open_in_memory().unwrap());
    let clock = ManualClock::new(Utc::now());

    // Bout 1: practice, the worked example
    let info = MatchInfo::new(date(2024, 5, 1)).with_opponent(Some("Sato".to_string()));
    let mut session = RecordingSession::start(&store, info, Box::new(clock.clone())).unwrap();

    technique(&mut session, Actor::Me, TechniqueType::Tsuki, TargetArea::Chudan, Point::TWO);
    technique(&mut session, Actor::Opponent, TechniqueType::Geri, TargetArea::Jodan, Point::THREE);
    session.add_penalty(Actor::Me, PenaltyCategory::Category1);
    session.set_senshu(Some(Actor::Me));

    let first = session.save(&mut store).unwrap();
    assert_eq!(first.score(Actor::Me), 2);
    assert_eq!(first.score(Actor::Opponent), 3);

    // Bout 2: tournament, a mistaken entry undone inside the window
    session.set_date(date(2024, 6, 1));
    session.set_match_type(MatchType::Tournament);
    session.set_tournament_name(Some("県大会".to_string()));
    session.set_opponent_name(Some("Suzuki".to_string()));

    technique(&mut session, Actor::Me, TechniqueType::Kokashi, TargetArea::Chudan, Point::THREE);
    technique(&mut session, Actor::Me, TechniqueType::Geri, TargetArea::Jodan, Point::ONE);
    clock.advance(Duration::milliseconds(500));
    assert!(session.undo_last().is_some());
    session.add_penalty(Actor::Opponent, PenaltyCategory::Category2);
    clock.advance(Duration::seconds(5));
    assert!(session.undo_last().is_none());

    let second = match session.flush(&mut store).unwrap() {
        FlushOutcome::Saved(record) => record,
        other => panic!("expected the scored draft to be saved, got {:?}", other),
    };
    assert_eq!(second.techniques.len(), 1);
    assert_eq!(second.techniques[0].sub_technique, Some(TechniqueType::Tsuki));
    assert_eq!(second.techniques[0].tournament_name.as_deref(), Some("県大会"));

    // Registries grew from the saved bouts
    assert_eq!(store.opponents().unwrap().names(), &["Sato".to_string(), "Suzuki".to_string()]);
    assert!(store.tournaments().unwrap().contains("県大会"));

    // An empty follow-up draft cannot be saved
    session.set_senshu(Some(Actor::Opponent));
    assert!(matches!(session.save(&mut store), Err(SessionError::EmptyMatch)));
    assert_eq!(session.flush(&mut store).unwrap(), FlushOutcome::Discarded);
    assert_eq!(store.all_match_records().unwrap().len(), 2);

    // Analysis over the newest-first list
    let records = store.records_newest_first().unwrap();
    assert_eq!(records[0].id, second.id);

    let all = AnalysisReport::build(&records, &AnalysisFilter::default());
    assert_eq!(all.record_count, 2);
    assert_eq!(all.penalty_rate.category1, 0.5);
    assert_eq!(all.penalty_rate.category2, 0.5);
    let total: u32 = all.score_distribution.iter().map(|s| s.points).sum();
    assert_eq!(total, 8);

    let practice = AnalysisReport::build(
        &records,
        &AnalysisFilter::new(MatchTypeFilter::Only(MatchType::Practice), Period::Recent),
    );
    assert_eq!(practice.record_count, 1);
    assert_eq!(practice.technique_frequency.len(), 2);

    // CSV newest first, like the list
    let csv = to_csv_string(&records, QuoteStyle::Standard).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], CSV_HEADERS.join(","));
    assert_eq!(
        lines[1],
        format!("{},2024-06-01,大会,県大会,Suzuki,中段こかし3点自分,,0,0,0,1", second.id)
    );
    assert_eq!(
        lines[2],
        format!(
            "{},2024-05-01,練習,,Sato,中段突き2点自分、上段蹴り3点相手,自分,1,0,0,0",
            first.id
        )
    );
}

#[test]
fn test_edit_session_replaces_saved_bout() {
    let mut store = RecordStore::new(SqliteStore::open_in_memory().unwrap());
    let clock = ManualClock::new(Utc::now());

    let mut session =
        RecordingSession::start(&store, MatchInfo::new(date(2024, 5, 1)), Box::new(clock.clone()))
            .unwrap();
    technique(&mut session, Actor::Opponent, TechniqueType::Tsuki, TargetArea::Jodan, Point::ONE);
    let saved = session.save(&mut store).unwrap();

    let stored = store.match_record(&saved.id).unwrap().unwrap();
    let mut editor = RecordingSession::edit(stored, Box::new(clock));
    editor.remove_technique(0).unwrap();
    technique(&mut editor, Actor::Me, TechniqueType::Geri, TargetArea::Chudan, Point::TWO);
    editor.save(&mut store).unwrap();

    let records = store.all_match_records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, saved.id);
    assert_eq!(records[0].score(Actor::Me), 2);
    assert_eq!(records[0].score(Actor::Opponent), 0);
}
