use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use kumite_log::{
    Actor, FlushOutcome, KeyValueStore, MatchRecord, MatchType, PenaltyCategory, Point, RecordStore,
    RecordingSession, SessionError, SideColor, TargetArea, TechniqueType,
};
use kumite_log::session::EntryStep;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;

/// Which pane receives arrow keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Entry,
    Recorded,
}

/// A row of the recorded list: techniques first, then penalties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DraftRow {
    Technique(usize),
    Penalty(usize),
}

pub struct App<S: KeyValueStore> {
    pub session: RecordingSession,
    pub store: RecordStore<S>,
    pub focus: Focus,
    pub list_state: TableState,
    /// Last status line (errors, save results)
    pub status: Option<String>,
    /// Set after a blocked quit; a second `q` discards the draft
    pub quit_armed: bool,
    /// Set when the loop should end
    pub finished: Option<FlushOutcome>,
}

impl<S: KeyValueStore> App<S> {
    pub fn new(session: RecordingSession, store: RecordStore<S>) -> Self {
        Self {
            session,
            store,
            focus: Focus::Entry,
            list_state: TableState::default(),
            status: None,
            quit_armed: false,
            finished: None,
        }
    }

    fn rows(&self) -> Vec<DraftRow> {
        (0..self.session.techniques().len())
            .map(DraftRow::Technique)
            .chain((0..self.session.penalties().len()).map(DraftRow::Penalty))
            .collect()
    }

    pub fn next(&mut self) {
        let len = self.rows().len();
        if len == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.rows().len();
        if len == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.list_state.select(Some(i));
    }

    fn clamp_selection(&mut self) {
        let len = self.rows().len();
        match self.list_state.selected() {
            _ if len == 0 => self.list_state.select(None),
            Some(i) if i >= len => self.list_state.select(Some(len - 1)),
            _ => {}
        }
    }

    fn delete_selected(&mut self) -> Result<(), SessionError> {
        let Some(row) = self
            .list_state
            .selected()
            .and_then(|i| self.rows().get(i).copied())
        else {
            return Ok(());
        };

        let removed = match row {
            DraftRow::Technique(i) => self.session.remove_technique(i)?.summary(),
            DraftRow::Penalty(i) => {
                let p = self.session.remove_penalty(i)?;
                format!("{} {}", p.actor, p.category)
            }
        };
        self.status = Some(format!("削除しました: {}", removed));
        self.clamp_selection();
        Ok(())
    }

    /// Number keys 1-3 map onto the options of the current wizard step
    fn choose(&mut self, n: usize) -> Result<(), SessionError> {
        let index = n - 1;
        match self.session.step() {
            EntryStep::SelectActor => {
                if let Some(actor) = Actor::ALL.get(index) {
                    self.session.choose_actor(*actor)?;
                }
            }
            EntryStep::SelectTechnique { .. } => {
                if let Some(technique) = TechniqueType::ALL.get(index) {
                    self.session.choose_technique(*technique)?;
                }
            }
            EntryStep::SelectArea { .. } => {
                if let Some(area) = TargetArea::ALL.get(index) {
                    self.session.choose_area(*area)?;
                }
            }
            EntryStep::SelectPoint { .. } => {
                if let Some(point) = Point::ALL.get(index) {
                    self.session.choose_point(*point)?;
                }
            }
        }
        Ok(())
    }

    fn save(&mut self) -> Result<(), SessionError> {
        match self.session.save(&mut self.store) {
            Ok(record) => {
                self.status = Some(format!("保存しました ({})", score_line(&record)));
                self.list_state.select(None);
                Ok(())
            }
            Err(SessionError::EmptyMatch) => {
                self.status = Some("両者0点の試合は保存できません".to_string());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn quit(&mut self) -> Result<(), SessionError> {
        if self.quit_armed {
            self.session.discard();
            self.finished = Some(FlushOutcome::Discarded);
            return Ok(());
        }

        match self.session.flush(&mut self.store)? {
            FlushOutcome::Blocked => {
                self.status = Some(
                    "技が記録されていますが両者0点です。もう一度 q で破棄して終了".to_string(),
                );
                self.quit_armed = true;
            }
            outcome => self.finished = Some(outcome),
        }
        Ok(())
    }

    /// Apply one key press. Storage failures propagate; everything else
    /// lands on the status line.
    pub fn handle_key(&mut self, code: KeyCode) -> Result<(), SessionError> {
        if code != KeyCode::Char('q') {
            self.quit_armed = false;
        }

        let result = match code {
            KeyCode::Char('q') => self.quit(),
            KeyCode::Char(c @ '1'..='3') => self.choose(c as usize - '0' as usize),
            KeyCode::Esc => {
                self.session.cancel_entry();
                Ok(())
            }
            KeyCode::Char(c @ ('z' | 'x' | ',' | '.')) => {
                let (actor, category) = match c {
                    'z' => (Actor::Me, PenaltyCategory::Category1),
                    'x' => (Actor::Me, PenaltyCategory::Category2),
                    ',' => (Actor::Opponent, PenaltyCategory::Category1),
                    _ => (Actor::Opponent, PenaltyCategory::Category2),
                };
                self.session.add_penalty(actor, category);
                Ok(())
            }
            KeyCode::Char(c @ ('a' | 'l' | '0')) => {
                let holder = match c {
                    'a' => Some(Actor::Me),
                    'l' => Some(Actor::Opponent),
                    _ => None,
                };
                self.session.set_senshu(holder);
                Ok(())
            }
            KeyCode::Char('u') => {
                if let Some(undone) = self.session.undo_last() {
                    self.status = Some(format!("取り消しました: {}", undone.message()));
                    self.clamp_selection();
                }
                Ok(())
            }
            KeyCode::Char('w') => self.session.toggle_color_assignment(&mut self.store).map(|_| ()),
            KeyCode::Char('m') => {
                let toggled = self.session.info().match_type.toggled();
                self.session.set_match_type(toggled);
                Ok(())
            }
            KeyCode::Char('S') => self.save(),
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Focus::Entry => Focus::Recorded,
                    Focus::Recorded => Focus::Entry,
                };
                if self.focus == Focus::Recorded && self.list_state.selected().is_none() {
                    self.next();
                }
                Ok(())
            }
            KeyCode::Down | KeyCode::Char('j') if self.focus == Focus::Recorded => {
                self.next();
                Ok(())
            }
            KeyCode::Up | KeyCode::Char('k') if self.focus == Focus::Recorded => {
                self.previous();
                Ok(())
            }
            KeyCode::Char('d') | KeyCode::Delete if self.focus == Focus::Recorded => {
                self.delete_selected()
            }
            _ => Ok(()),
        };

        match result {
            Err(SessionError::Storage(e)) => Err(SessionError::Storage(e)),
            Err(other) => {
                self.status = Some(other.to_string());
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }
}

fn score_line(record: &MatchRecord) -> String {
    let board = record.scoreboard();
    format!(
        "{} {} - {} {}",
        Actor::Me,
        board.display(Actor::Me),
        board.display(Actor::Opponent),
        Actor::Opponent
    )
}

fn step_options(step: EntryStep) -> Vec<String> {
    match step {
        EntryStep::SelectActor => Actor::ALL.iter().map(|a| a.to_string()).collect(),
        EntryStep::SelectTechnique { .. } => {
            TechniqueType::ALL.iter().map(|t| t.to_string()).collect()
        }
        EntryStep::SelectArea { .. } => TargetArea::ALL.iter().map(|a| a.to_string()).collect(),
        EntryStep::SelectPoint { .. } => Point::ALL.iter().map(|p| format!("{}点", p)).collect(),
    }
}

fn side_color(color: SideColor) -> Color {
    match color {
        SideColor::Blue => Color::Blue,
        SideColor::Red => Color::Red,
    }
}

/// Run the recording screen until the user quits. Returns how the draft ended.
pub fn run_ui<S: KeyValueStore>(app: &mut App<S>) -> Result<FlushOutcome> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_app<B: ratatui::backend::Backend, S: KeyValueStore>(
    terminal: &mut Terminal<B>,
    app: &mut App<S>,
) -> Result<FlushOutcome> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Some(outcome) = app.finished.take() {
            return Ok(outcome);
        }

        // Poll so the notification disappears when its window closes
        if !event::poll(Duration::from_millis(200))? {
            continue;
        }

        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                app.handle_key(key.code)?;
            }
        }
    }
}

fn ui<S: KeyValueStore>(f: &mut Frame, app: &mut App<S>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Scoreboard
            Constraint::Min(0),    // Entry + recorded list
            Constraint::Length(3), // Notification / status
            Constraint::Length(3), // Key help
        ])
        .split(f.size());

    render_scoreboard(f, chunks[0], app);

    let content = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[1]);

    render_entry(f, content[0], app);
    render_recorded(f, content[1], app);
    render_notification(f, chunks[2], app);
    render_help(f, chunks[3]);
}

fn render_scoreboard<S: KeyValueStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let session = &app.session;
    let board = session.scoreboard();
    let info = session.info();

    let side = |actor: Actor| {
        let color = session.color_of(actor);
        vec![
            Span::styled(
                format!(" {}({}) ", actor, color.as_str()),
                Style::default()
                    .fg(Color::White)
                    .bg(side_color(color))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(" {} ", board.display(actor)),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                PenaltyCategory::ALL
                    .iter()
                    .map(|&c| format!("{}:{}", c.short(), session.penalty_count(actor, c)))
                    .collect::<Vec<_>>()
                    .join(" "),
                Style::default().fg(Color::DarkGray),
            ),
        ]
    };

    let mut score_spans = side(Actor::Me);
    score_spans.push(Span::raw("   vs   "));
    score_spans.extend(side(Actor::Opponent));

    let mut info_spans = vec![
        Span::styled(info.date.to_string(), Style::default().fg(Color::Cyan)),
        Span::raw("  "),
        Span::styled(
            info.match_type.as_str(),
            match info.match_type {
                MatchType::Tournament => Style::default().fg(Color::Magenta),
                MatchType::Practice => Style::default().fg(Color::Green),
            },
        ),
    ];
    if let Some(tournament) = &info.tournament_name {
        info_spans.push(Span::raw(format!("  {}", tournament)));
    }
    if let Some(opponent) = &info.opponent_name {
        info_spans.push(Span::raw(format!("  vs {}", opponent)));
    }
    if session.is_editing() {
        info_spans.push(Span::styled("  [編集]", Style::default().fg(Color::Yellow)));
    }

    let header = Paragraph::new(vec![Line::from(score_spans), Line::from(info_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn render_entry<S: KeyValueStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let step = app.session.step();

    let mut lines = vec![
        Line::from(Span::styled(
            format!("  {}", step.prompt()),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];

    for (i, option) in step_options(step).iter().enumerate() {
        lines.push(Line::from(vec![
            Span::styled(format!("  [{}] ", i + 1), Style::default().fg(Color::Cyan)),
            Span::raw(option.clone()),
        ]));
    }

    let border = if app.focus == Focus::Entry {
        Color::Yellow
    } else {
        Color::White
    };

    let panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(" 得点入力 "),
    );

    f.render_widget(panel, area);
}

fn render_recorded<S: KeyValueStore>(f: &mut Frame, area: Rect, app: &mut App<S>) {
    let header_cells = ["#", "記録", "選手"].iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let session = &app.session;
    let mut rows: Vec<Row> = Vec::new();

    for (i, t) in session.techniques().enumerate() {
        let color = side_color(session.color_of(t.actor));
        rows.push(Row::new(vec![
            Cell::from(format!("{}", i + 1)),
            Cell::from(format!("{} {}点", t.label(), t.point)),
            Cell::from(t.actor.as_str()).style(Style::default().fg(color)),
        ]));
    }
    for p in session.penalties() {
        let color = side_color(session.color_of(p.actor));
        rows.push(Row::new(vec![
            Cell::from("反則"),
            Cell::from(p.category.as_str()).style(Style::default().fg(Color::Red)),
            Cell::from(p.actor.as_str()).style(Style::default().fg(color)),
        ]));
    }

    let senshu = match session.senshu() {
        Some(actor) => format!(" 記録 (先取: {}) ", actor),
        None => " 記録 ".to_string(),
    };

    let border = if app.focus == Focus::Recorded {
        Color::Yellow
    } else {
        Color::White
    };

    let table = Table::new(
        rows,
        [
            Constraint::Length(6),
            Constraint::Min(16),
            Constraint::Length(8),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(senshu),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.list_state);
}

fn render_notification<S: KeyValueStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let line = match (app.session.notification(), &app.status) {
        (Some(n), _) => Line::from(vec![
            Span::styled(format!(" {} ", n.message()), Style::default().fg(Color::Green)),
            Span::styled("(u で取り消し)", Style::default().fg(Color::DarkGray)),
        ]),
        (None, Some(status)) => Line::from(Span::styled(
            format!(" {}", status),
            Style::default().fg(Color::Yellow),
        )),
        (None, None) => Line::from(""),
    };

    let bar = Paragraph::new(vec![line]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(bar, area);
}

fn render_help(f: &mut Frame, area: Rect) {
    let keys = [
        ("1-3", "選択"),
        ("Esc", "入力取消"),
        ("z/x", "自分C1/C2"),
        (",/.", "相手C1/C2"),
        ("a/l/0", "先取"),
        ("u", "取り消し"),
        ("Tab", "一覧"),
        ("d", "削除"),
        ("w", "色入替"),
        ("m", "種別"),
        ("S", "保存"),
    ];

    let mut spans = Vec::new();
    for (key, label) in keys {
        spans.push(Span::styled(key, Style::default().fg(Color::Yellow)));
        spans.push(Span::raw(format!(" {} | ", label)));
    }
    spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    spans.push(Span::raw(" 終了"));

    let help = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(help, area);
}
