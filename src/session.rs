// 📝 Match Recording Session - live capture of one bout
//
// The session owns a draft (techniques, penalties, senshu, match info) and
// nothing else. Data only reaches the RecordStore through `save` or the
// end-of-session `flush`, which the hosting shell must call before exit.
//
// Technique entry is a four-step wizard:
//
//   SelectActor → SelectTechnique → SelectArea → SelectPoint → (commit)
//                        └──── Kokashi ─────────────┘
//
// Every commit raises a notification that can be undone until it expires.

use crate::entities::{
    non_blank, penalty_count_of, score_of, Actor, MatchRecord, MatchType, PenaltyCategory,
    PenaltyRecord, Point, Scoreboard, SideColor, TargetArea, TechniqueRecord, TechniqueType,
};
use crate::record_store::RecordStore;
use crate::storage::KeyValueStore;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::cell::Cell;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// How long a notification (and its undo) stays available
pub const DEFAULT_UNDO_WINDOW_MS: u64 = 2000;

/// Upper bound for a configured window
pub const MAX_UNDO_WINDOW_MS: u64 = 60_000;

// ============================================================================
// CLOCK
// ============================================================================

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualClock {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("both scores are zero; record at least one technique before saving")]
    EmptyMatch,

    #[error("cannot {action} while waiting to {step}")]
    InvalidStep {
        action: &'static str,
        step: &'static str,
    },

    #[error("no {kind} at position {index} (draft has {len})")]
    IndexOutOfRange {
        kind: &'static str,
        index: usize,
        len: usize,
    },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

// ============================================================================
// ENTRY WIZARD
// ============================================================================

/// Where the technique wizard currently is. Each step carries the choices
/// made so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStep {
    SelectActor,
    SelectTechnique {
        actor: Actor,
    },
    SelectArea {
        actor: Actor,
        technique: TechniqueType,
    },
    SelectPoint {
        actor: Actor,
        technique: TechniqueType,
        area: TargetArea,
    },
}

impl EntryStep {
    pub fn name(&self) -> &'static str {
        match self {
            EntryStep::SelectActor => "select an actor",
            EntryStep::SelectTechnique { .. } => "select a technique",
            EntryStep::SelectArea { .. } => "select a target area",
            EntryStep::SelectPoint { .. } => "select a point",
        }
    }

    /// Question shown to the user for this step
    pub fn prompt(&self) -> String {
        match self {
            EntryStep::SelectActor => "誰の得点ですか？".to_string(),
            EntryStep::SelectTechnique { actor } => format!("{}の技の種類は？", actor),
            EntryStep::SelectArea { .. } => "どこに当てましたか？".to_string(),
            EntryStep::SelectPoint { .. } => "何点ですか？".to_string(),
        }
    }
}

impl Default for EntryStep {
    fn default() -> Self {
        EntryStep::SelectActor
    }
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

/// What the most recent action did. `seq` identifies the drafted entry so
/// undo removes exactly that one.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Technique {
        seq: u64,
        record: TechniqueRecord,
    },
    Penalty {
        seq: u64,
        record: PenaltyRecord,
    },
    Senshu {
        previous: Option<Actor>,
        current: Option<Actor>,
    },
}

impl Notification {
    pub fn message(&self) -> String {
        match self {
            Notification::Technique { record, .. } => {
                // Takedowns have no chosen area, so none is shown
                let area = if record.technique.needs_area() {
                    record.area.as_str()
                } else {
                    ""
                };
                format!(
                    "{}・{}{}{}点と記録しました",
                    record.actor, area, record.technique, record.point
                )
            }
            Notification::Penalty { record, .. } => {
                format!("{}の{}を記録しました", record.actor, record.category)
            }
            Notification::Senshu {
                current: Some(actor),
                ..
            } => format!("{}の先取を記録しました", actor),
            Notification::Senshu { current: None, .. } => "先取なしを記録しました".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Pending {
    notification: Notification,
    expires_at: DateTime<Utc>,
}

// ============================================================================
// DRAFT
// ============================================================================

/// Bout metadata edited alongside the draft
#[derive(Debug, Clone, PartialEq)]
pub struct MatchInfo {
    pub date: NaiveDate,
    pub match_type: MatchType,
    pub tournament_name: Option<String>,
    pub opponent_name: Option<String>,
}

impl MatchInfo {
    pub fn new(date: NaiveDate) -> Self {
        MatchInfo {
            date,
            match_type: MatchType::Practice,
            tournament_name: None,
            opponent_name: None,
        }
    }

    pub fn with_match_type(mut self, match_type: MatchType) -> Self {
        self.match_type = match_type;
        self
    }

    pub fn with_tournament(mut self, name: Option<String>) -> Self {
        self.tournament_name = non_blank(name);
        self
    }

    pub fn with_opponent(mut self, name: Option<String>) -> Self {
        self.opponent_name = non_blank(name);
        self
    }
}

#[derive(Debug, Clone)]
struct Entry<T> {
    seq: u64,
    record: T,
}

/// Result of ending a session
#[derive(Debug, Clone, PartialEq)]
pub enum FlushOutcome {
    /// There was a score, so the draft was committed
    Saved(MatchRecord),
    /// Techniques are drafted but nothing scores; caller must warn, nothing written
    Blocked,
    /// Nothing worth keeping; draft dropped
    Discarded,
}

// ============================================================================
// SESSION
// ============================================================================

pub struct RecordingSession {
    clock: Box<dyn Clock>,
    undo_window: Duration,

    match_id: String,
    /// Set when the session was opened on an existing record
    editing: bool,
    info: MatchInfo,

    techniques: Vec<Entry<TechniqueRecord>>,
    penalties: Vec<Entry<PenaltyRecord>>,
    senshu: Option<Actor>,
    colors_swapped: bool,

    step: EntryStep,
    pending: Option<Pending>,
    next_seq: u64,
}

impl RecordingSession {
    /// Fresh draft for a new bout
    pub fn new(info: MatchInfo, colors_swapped: bool, clock: Box<dyn Clock>) -> Self {
        RecordingSession {
            clock,
            undo_window: Duration::milliseconds(DEFAULT_UNDO_WINDOW_MS as i64),
            match_id: new_match_id(),
            editing: false,
            info,
            techniques: Vec::new(),
            penalties: Vec::new(),
            senshu: None,
            colors_swapped,
            step: EntryStep::SelectActor,
            pending: None,
            next_seq: 0,
        }
    }

    /// New bout, color preference read once from the store
    pub fn start<S: KeyValueStore>(
        store: &RecordStore<S>,
        info: MatchInfo,
        clock: Box<dyn Clock>,
    ) -> Result<Self, SessionError> {
        let swapped = store.colors_swapped()?;
        Ok(RecordingSession::new(info, swapped, clock))
    }

    /// Re-open a saved record. Saving replaces it by id and keeps the
    /// color assignment it was recorded with.
    pub fn edit(record: MatchRecord, clock: Box<dyn Clock>) -> Self {
        let info = MatchInfo {
            date: record.date,
            match_type: record.match_type,
            tournament_name: non_blank(record.tournament_name),
            opponent_name: non_blank(record.opponent_name),
        };

        let mut session = RecordingSession::new(info, record.colors_swapped, clock);
        session.match_id = record.id;
        session.editing = true;
        session.senshu = record.senshu;

        for technique in record.techniques {
            let seq = session.bump_seq();
            session.techniques.push(Entry { seq, record: technique });
        }
        for penalty in record.penalties {
            let seq = session.bump_seq();
            session.penalties.push(Entry { seq, record: penalty });
        }

        session
    }

    pub fn with_undo_window(mut self, window: Duration) -> Self {
        self.undo_window = window;
        self
    }

    fn bump_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    // ========================================================================
    // READ ACCESS
    // ========================================================================

    pub fn match_id(&self) -> &str {
        &self.match_id
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn info(&self) -> &MatchInfo {
        &self.info
    }

    pub fn step(&self) -> EntryStep {
        self.step
    }

    pub fn techniques(&self) -> impl ExactSizeIterator<Item = &TechniqueRecord> + '_ {
        self.techniques.iter().map(|e| &e.record)
    }

    pub fn penalties(&self) -> impl ExactSizeIterator<Item = &PenaltyRecord> + '_ {
        self.penalties.iter().map(|e| &e.record)
    }

    pub fn senshu(&self) -> Option<Actor> {
        self.senshu
    }

    pub fn colors_swapped(&self) -> bool {
        self.colors_swapped
    }

    pub fn color_of(&self, actor: Actor) -> SideColor {
        SideColor::for_actor(actor, self.colors_swapped)
    }

    pub fn score(&self, actor: Actor) -> u32 {
        score_of(self.techniques(), actor)
    }

    pub fn penalty_count(&self, actor: Actor, category: PenaltyCategory) -> usize {
        penalty_count_of(self.penalties(), actor, category)
    }

    pub fn scoreboard(&self) -> Scoreboard {
        Scoreboard {
            me: self.score(Actor::Me),
            opponent: self.score(Actor::Opponent),
            senshu: self.senshu,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.techniques.is_empty() && self.penalties.is_empty() && self.senshu.is_none()
    }

    /// The live notification, if its window has not elapsed
    pub fn notification(&self) -> Option<&Notification> {
        let now = self.clock.now();
        self.pending
            .as_ref()
            .filter(|p| now < p.expires_at)
            .map(|p| &p.notification)
    }

    // ========================================================================
    // MATCH INFO
    // ========================================================================

    pub fn set_date(&mut self, date: NaiveDate) {
        self.info.date = date;
    }

    pub fn set_match_type(&mut self, match_type: MatchType) {
        self.info.match_type = match_type;
    }

    pub fn set_tournament_name(&mut self, name: Option<String>) {
        self.info.tournament_name = non_blank(name);
    }

    pub fn set_opponent_name(&mut self, name: Option<String>) {
        self.info.opponent_name = non_blank(name);
    }

    // ========================================================================
    // TECHNIQUE WIZARD
    // ========================================================================

    pub fn choose_actor(&mut self, actor: Actor) -> Result<(), SessionError> {
        match self.step {
            EntryStep::SelectActor => {
                self.step = EntryStep::SelectTechnique { actor };
                Ok(())
            }
            other => Err(invalid_step("choose an actor", other)),
        }
    }

    pub fn choose_technique(&mut self, technique: TechniqueType) -> Result<(), SessionError> {
        match self.step {
            EntryStep::SelectTechnique { actor } => {
                self.step = if technique.needs_area() {
                    EntryStep::SelectArea { actor, technique }
                } else {
                    EntryStep::SelectPoint {
                        actor,
                        technique,
                        area: TargetArea::default(),
                    }
                };
                Ok(())
            }
            other => Err(invalid_step("choose a technique", other)),
        }
    }

    pub fn choose_area(&mut self, area: TargetArea) -> Result<(), SessionError> {
        match self.step {
            EntryStep::SelectArea { actor, technique } => {
                self.step = EntryStep::SelectPoint {
                    actor,
                    technique,
                    area,
                };
                Ok(())
            }
            other => Err(invalid_step("choose an area", other)),
        }
    }

    /// Final step: commits the technique and returns the wizard to the start
    pub fn choose_point(&mut self, point: Point) -> Result<(), SessionError> {
        let EntryStep::SelectPoint {
            actor,
            technique,
            area,
        } = self.step
        else {
            return Err(invalid_step("choose a point", self.step));
        };

        let record = TechniqueRecord {
            match_id: self.match_id.clone(),
            date: self.info.date,
            match_type: self.info.match_type,
            tournament_name: self.info.tournament_name.clone(),
            opponent_name: self.info.opponent_name.clone(),
            actor,
            technique,
            sub_technique: technique.implied_sub_technique(),
            area,
            point,
        };

        let seq = self.bump_seq();
        self.techniques.push(Entry {
            seq,
            record: record.clone(),
        });
        self.step = EntryStep::SelectActor;
        self.notify(Notification::Technique { seq, record });
        Ok(())
    }

    /// Abandon the technique being entered
    pub fn cancel_entry(&mut self) {
        self.step = EntryStep::SelectActor;
    }

    // ========================================================================
    // PENALTIES / SENSHU
    // ========================================================================

    pub fn add_penalty(&mut self, actor: Actor, category: PenaltyCategory) {
        let record = PenaltyRecord {
            match_id: self.match_id.clone(),
            actor,
            category,
        };

        let seq = self.bump_seq();
        self.penalties.push(Entry {
            seq,
            record: record.clone(),
        });
        self.notify(Notification::Penalty { seq, record });
    }

    /// Only one side (or nobody) holds senshu; this replaces any prior value
    pub fn set_senshu(&mut self, actor: Option<Actor>) {
        let previous = self.senshu;
        self.senshu = actor;
        self.notify(Notification::Senshu {
            previous,
            current: actor,
        });
    }

    // ========================================================================
    // UNDO / REMOVAL
    // ========================================================================

    fn notify(&mut self, notification: Notification) {
        debug!(message = %notification.message(), "notification");
        self.pending = Some(Pending {
            notification,
            expires_at: self
                .clock
                .now()
                .checked_add_signed(self.undo_window)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        });
    }

    /// Revert whatever raised the live notification. Returns what was
    /// undone, or None once the window has elapsed.
    pub fn undo_last(&mut self) -> Option<Notification> {
        let pending = self.pending.take()?;
        if self.clock.now() >= pending.expires_at {
            return None;
        }

        match &pending.notification {
            Notification::Technique { seq, .. } => self.techniques.retain(|e| e.seq != *seq),
            Notification::Penalty { seq, .. } => self.penalties.retain(|e| e.seq != *seq),
            Notification::Senshu { previous, .. } => self.senshu = *previous,
        }

        debug!(message = %pending.notification.message(), "undone");
        Some(pending.notification)
    }

    /// Positional delete, available regardless of the undo window
    pub fn remove_technique(&mut self, index: usize) -> Result<TechniqueRecord, SessionError> {
        let len = self.techniques.len();
        if index >= len {
            return Err(SessionError::IndexOutOfRange {
                kind: "technique",
                index,
                len,
            });
        }

        let entry = self.techniques.remove(index);
        self.forget_notification_for(entry.seq);
        Ok(entry.record)
    }

    pub fn remove_penalty(&mut self, index: usize) -> Result<PenaltyRecord, SessionError> {
        let len = self.penalties.len();
        if index >= len {
            return Err(SessionError::IndexOutOfRange {
                kind: "penalty",
                index,
                len,
            });
        }

        let entry = self.penalties.remove(index);
        self.forget_notification_for(entry.seq);
        Ok(entry.record)
    }

    // An explicit removal consumes the undo for that same entry
    fn forget_notification_for(&mut self, seq: u64) {
        let matches = match self.pending.as_ref().map(|p| &p.notification) {
            Some(Notification::Technique { seq: s, .. })
            | Some(Notification::Penalty { seq: s, .. }) => *s == seq,
            _ => false,
        };
        if matches {
            self.pending = None;
        }
    }

    // ========================================================================
    // PRESENTATION
    // ========================================================================

    /// Flip blue/red between the sides and persist the preference.
    /// Returns the new value.
    pub fn toggle_color_assignment<S: KeyValueStore>(
        &mut self,
        store: &mut RecordStore<S>,
    ) -> Result<bool, SessionError> {
        self.colors_swapped = !self.colors_swapped;
        store.set_colors_swapped(self.colors_swapped)?;
        Ok(self.colors_swapped)
    }

    // ========================================================================
    // SAVE / FLUSH
    // ========================================================================

    /// The draft as a MatchRecord. Every entry is stamped with the draft's
    /// id and the current match info.
    pub fn to_record(&self) -> MatchRecord {
        let techniques = self
            .techniques
            .iter()
            .map(|e| TechniqueRecord {
                match_id: self.match_id.clone(),
                date: self.info.date,
                match_type: self.info.match_type,
                tournament_name: self.info.tournament_name.clone(),
                opponent_name: self.info.opponent_name.clone(),
                ..e.record.clone()
            })
            .collect();

        let penalties = self
            .penalties
            .iter()
            .map(|e| PenaltyRecord {
                match_id: self.match_id.clone(),
                ..e.record.clone()
            })
            .collect();

        MatchRecord {
            id: self.match_id.clone(),
            date: self.info.date,
            match_type: self.info.match_type,
            tournament_name: self.info.tournament_name.clone(),
            opponent_name: self.info.opponent_name.clone(),
            techniques,
            penalties,
            senshu: self.senshu,
            colors_swapped: self.colors_swapped,
        }
    }

    /// Commit the draft. Rejected without touching the store when neither
    /// side has scored. On success the draft is cleared for the next bout.
    pub fn save<S: KeyValueStore>(
        &mut self,
        store: &mut RecordStore<S>,
    ) -> Result<MatchRecord, SessionError> {
        if self.scoreboard().is_scoreless() {
            debug!(match_id = %self.match_id, "save rejected: both scores are zero");
            return Err(SessionError::EmptyMatch);
        }

        let record = self.to_record();

        if self.editing {
            if !store.update_match_record(&record)? {
                // Edited record vanished underneath us; keep the work
                store.save_match_record(&record)?;
            }
        } else {
            store.save_match_record(&record)?;
        }

        info!(
            id = %record.id,
            me = record.score(Actor::Me),
            opponent = record.score(Actor::Opponent),
            "bout saved"
        );

        self.reset_draft();
        Ok(record)
    }

    /// End-of-session hook. Keeps real progress, refuses to create empty
    /// records, and drops a draft that never scored.
    pub fn flush<S: KeyValueStore>(
        &mut self,
        store: &mut RecordStore<S>,
    ) -> Result<FlushOutcome, SessionError> {
        if !self.scoreboard().is_scoreless() {
            return self.save(store).map(FlushOutcome::Saved);
        }

        if !self.techniques.is_empty() {
            warn!(
                match_id = %self.match_id,
                techniques = self.techniques.len(),
                "leaving with drafted techniques but no score"
            );
            return Ok(FlushOutcome::Blocked);
        }

        if !self.is_empty() {
            debug!(match_id = %self.match_id, "discarding draft without score");
        }
        self.reset_draft();
        Ok(FlushOutcome::Discarded)
    }

    /// Throw the draft away unconditionally (after a Blocked flush, for one)
    pub fn discard(&mut self) {
        self.reset_draft();
    }

    fn reset_draft(&mut self) {
        self.match_id = new_match_id();
        self.editing = false;
        self.techniques.clear();
        self.penalties.clear();
        self.senshu = None;
        self.step = EntryStep::SelectActor;
        self.pending = None;
    }
}

fn new_match_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn invalid_step(action: &'static str, step: EntryStep) -> SessionError {
    SessionError::InvalidStep {
        action,
        step: step.name(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
