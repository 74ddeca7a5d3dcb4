mod feedback;
mod worker;

use std::{
    io::{self, Stdout},
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout, Rect},
    prelude::CrosstermBackend,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Tabs, Wrap},
    Frame, Terminal,
};
use sop_client::{AudioDevice, Gateway, NextQuestion, RecordTaskAudio, RestDecision, Survey};
use sop_core::journal::append_event;
use sop_core::{
    state_dir, CountdownTimer, PanelConfig, SessionLabels, SessionState, Step, TimerEvent,
};

use crate::feedback::ToneFeedback;
use crate::worker::{Reply, Request, Worker};

fn main() -> Result<()> {
    let dir = state_dir()?;
    let config = PanelConfig::load(&dir.join("config.toml"))?;
    let gateway = Gateway::new(&config.base_url, config.request_timeout())?;
    let worker = Worker::spawn(gateway, config.rest.clone());
    let labels = SessionLabels::load().unwrap_or_default();

    let mut terminal = setup_terminal()?;
    let mut app = App::new(worker, labels, config.countdown_s, dir.join("events.tsv"));
    let result = run_loop(&mut terminal, &mut app);
    restore_terminal()?;
    result
}

fn run_loop<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    let poll_rate = Duration::from_millis(150);
    let mut last_second = Instant::now();

    while !app.should_quit {
        while let Some(reply) = app.worker.poll() {
            app.on_reply(reply);
        }
        if last_second.elapsed() >= Duration::from_secs(1) {
            last_second = Instant::now();
            app.on_second();
        }
        app.feedback.tick();

        terminal.draw(|f| draw(f, app))?;
        if event::poll(poll_rate)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }
    }
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("initializing terminal")
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Tab {
    Session,
    Tasks,
    Ser,
    Devices,
}

impl Tab {
    fn title(&self) -> &'static str {
        match self {
            Tab::Session => "Session",
            Tab::Tasks => "Tasks",
            Tab::Ser => "SER test",
            Tab::Devices => "Devices",
        }
    }

    fn all() -> [Tab; 4] {
        [Tab::Session, Tab::Tasks, Tab::Ser, Tab::Devices]
    }

    fn next(self) -> Self {
        match self {
            Tab::Session => Tab::Tasks,
            Tab::Tasks => Tab::Ser,
            Tab::Ser => Tab::Devices,
            Tab::Devices => Tab::Session,
        }
    }

    fn prev(self) -> Self {
        match self {
            Tab::Session => Tab::Devices,
            Tab::Tasks => Tab::Session,
            Tab::Ser => Tab::Tasks,
            Tab::Devices => Tab::Ser,
        }
    }

    fn index(self) -> usize {
        match self {
            Tab::Session => 0,
            Tab::Tasks => 1,
            Tab::Ser => 2,
            Tab::Devices => 3,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Focus {
    None,
    TaskId,
    EventMarker,
    Condition,
}

#[derive(Default)]
struct TextField {
    value: String,
    cursor: usize,
}

impl TextField {
    fn new(default: &str) -> Self {
        Self {
            value: default.to_string(),
            cursor: default.len(),
        }
    }

    /// Byte offset of the character before the cursor, if any. The cursor is
    /// a byte index and must always sit on a char boundary.
    fn prev_boundary(&self) -> Option<usize> {
        self.value[..self.cursor].char_indices().next_back().map(|(i, _)| i)
    }

    fn handle_key(&mut self, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Char(c)
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT =>
            {
                self.value.insert(self.cursor, c);
                self.cursor += c.len_utf8();
                true
            }
            KeyCode::Backspace => {
                if let Some(prev) = self.prev_boundary() {
                    self.value.remove(prev);
                    self.cursor = prev;
                }
                true
            }
            KeyCode::Delete => {
                if self.cursor < self.value.len() {
                    self.value.remove(self.cursor);
                }
                true
            }
            KeyCode::Left => {
                if let Some(prev) = self.prev_boundary() {
                    self.cursor = prev;
                }
                true
            }
            KeyCode::Right => {
                if let Some(c) = self.value[self.cursor..].chars().next() {
                    self.cursor += c.len_utf8();
                }
                true
            }
            KeyCode::Home => {
                self.cursor = 0;
                true
            }
            KeyCode::End => {
                self.cursor = self.value.len();
                true
            }
            _ => false,
        }
    }

    fn trimmed(&self) -> &str {
        self.value.trim()
    }
}

struct App {
    tab: Tab,
    focus: Focus,
    status: String,
    worker: Worker,
    journal_path: PathBuf,
    feedback: ToneFeedback,
    timer: CountdownTimer,
    session: SessionState,
    step_cursor: usize,
    labels: SessionLabels,
    task_id: TextField,
    event_marker: TextField,
    condition: TextField,
    surveys: Vec<Survey>,
    devices: Vec<AudioDevice>,
    device_cursor: usize,
    auto_selected: bool,
    ser_question: Option<String>,
    question: Option<NextQuestion>,
    questions_done: bool,
    transcription: Option<String>,
    rest: Option<RestDecision>,
    stream_active: Option<bool>,
    should_quit: bool,
}

impl App {
    fn new(
        worker: Worker,
        labels: SessionLabels,
        countdown_s: u32,
        journal_path: PathBuf,
    ) -> Self {
        Self {
            tab: Tab::Session,
            focus: Focus::None,
            status: "←/→ or 1-4 switch tabs, Tab focuses a field, q quits.".into(),
            worker,
            journal_path,
            feedback: ToneFeedback::new(true),
            timer: CountdownTimer::new(countdown_s),
            session: SessionState::default(),
            step_cursor: 0,
            task_id: TextField::default(),
            event_marker: TextField::new(labels.event_marker.as_deref().unwrap_or("")),
            condition: TextField::new(labels.condition.as_deref().unwrap_or("")),
            labels,
            surveys: Vec::new(),
            devices: Vec::new(),
            device_cursor: 0,
            auto_selected: false,
            ser_question: None,
            question: None,
            questions_done: false,
            transcription: None,
            rest: None,
            stream_active: None,
            should_quit: false,
        }
    }

    fn journal(&mut self, action: &str, detail: &str) {
        if let Err(err) = append_event(&self.journal_path, action, detail) {
            self.status = format!("journal write failed: {}", err);
        }
    }

    fn submit(&mut self, action: &'static str, detail: &str, request: Request) {
        self.worker.submit(request);
        self.journal(action, detail);
        self.status = format!("{}…", action);
    }

    // --- worker replies ---------------------------------------------------

    fn on_reply(&mut self, reply: Reply) {
        match reply {
            Reply::Status(message) => self.status = message,
            Reply::Failed { action, message } => {
                self.status = format!("{} failed: {}", action, message);
            }
            Reply::Devices(devices) => {
                self.device_cursor = 0;
                // Exactly one device means there is nothing to choose;
                // select it once and never again for this session.
                if devices.len() == 1 && !self.auto_selected {
                    self.auto_selected = true;
                    let index = devices[0].index;
                    self.status = format!("Auto-selected only device: {}", devices[0].name);
                    self.devices = devices;
                    self.worker.submit(Request::SetDevice(index));
                    self.journal("set_device", &index.to_string());
                } else {
                    self.status = format!("{} capture devices.", devices.len());
                    self.devices = devices;
                }
            }
            Reply::Surveys(surveys) => {
                self.status = format!(
                    "{} surveys ({} with URLs).",
                    surveys.len(),
                    surveys.iter().filter(|s| s.has_url()).count()
                );
                self.surveys = surveys;
            }
            Reply::Question(Some(next)) => {
                self.status = format!("Test {} question loaded; recording…", next.test_number);
                self.question = Some(next);
                self.questions_done = false;
                // Mirrors the original flow: a fresh question immediately
                // arms the microphone.
                self.worker.submit(Request::StartRecording);
                self.journal("start_recording", "question");
            }
            Reply::Question(None) => {
                self.question = None;
                self.questions_done = true;
                self.timer.stop();
                self.status = "No more questions.".into();
            }
            Reply::SerQuestion(question) => {
                self.status = "SER question loaded.".into();
                self.ser_question = Some(question);
            }
            Reply::Transcription(text) => {
                self.status = "Transcription loaded.".into();
                self.transcription = Some(text);
            }
            Reply::Rest(decision) => {
                self.status = format!("Rest time is set to {} minutes.", decision.rest_min);
                self.rest = Some(decision);
            }
            Reply::StreamActive(active) => {
                self.stream_active = Some(active);
                self.status = if active {
                    "Biometric stream is active.".into()
                } else {
                    "Biometric stream is NOT active.".into()
                };
            }
        }
    }

    // --- clock ------------------------------------------------------------

    fn on_second(&mut self) {
        match self.timer.tick() {
            Some(TimerEvent::Tick { .. }) => self.feedback.second_tick(),
            Some(TimerEvent::Finished) => {
                self.feedback.finished();
                self.status = sop_core::TIME_UP.into();
                self.journal("countdown_finished", "");
                // End-of-test: stop whatever the microphone is doing.
                self.worker.submit(Request::StopRecording);
            }
            None => {}
        }
    }

    // --- input ------------------------------------------------------------

    fn on_key(&mut self, key: KeyEvent) {
        if self.focus != Focus::None {
            match key.code {
                KeyCode::Esc => self.focus = Focus::None,
                KeyCode::Tab => self.advance_focus(),
                KeyCode::Enter => self.apply_focused_field(),
                _ => {
                    self.route_input(&key);
                }
            }
            return;
        }
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Left => self.tab = self.tab.prev(),
            KeyCode::Right => self.tab = self.tab.next(),
            KeyCode::Char('1') => self.tab = Tab::Session,
            KeyCode::Char('2') => self.tab = Tab::Tasks,
            KeyCode::Char('3') => self.tab = Tab::Ser,
            KeyCode::Char('4') => self.tab = Tab::Devices,
            KeyCode::Tab => self.advance_focus(),
            _ => match self.tab {
                Tab::Session => self.session_key(key.code),
                Tab::Tasks => self.tasks_key(key.code),
                Tab::Ser => self.ser_key(key.code),
                Tab::Devices => self.devices_key(key.code),
            },
        }
    }

    fn advance_focus(&mut self) {
        if self.tab != Tab::Tasks {
            self.focus = Focus::None;
            return;
        }
        self.focus = match self.focus {
            Focus::None => Focus::TaskId,
            Focus::TaskId => Focus::EventMarker,
            Focus::EventMarker => Focus::Condition,
            Focus::Condition => Focus::None,
        };
    }

    fn route_input(&mut self, key: &KeyEvent) {
        match self.focus {
            Focus::TaskId => {
                self.task_id.handle_key(key);
            }
            Focus::EventMarker => {
                self.event_marker.handle_key(key);
            }
            Focus::Condition => {
                self.condition.handle_key(key);
            }
            Focus::None => {}
        }
    }

    /// Enter in a field sends its value to the backend; event marker and
    /// condition are also persisted locally, like the original panel's
    /// localStorage keys.
    fn apply_focused_field(&mut self) {
        match self.focus {
            Focus::TaskId => {
                let task_id = self.task_id.trimmed().to_string();
                if task_id.is_empty() {
                    self.status = "Task id is empty.".into();
                    return;
                }
                self.submit("set_task_id", &task_id.clone(), Request::SetTaskId(task_id));
            }
            Focus::EventMarker => {
                let marker = self.event_marker.trimmed().to_string();
                if marker.is_empty() {
                    self.status = "Event marker is empty.".into();
                    return;
                }
                self.labels.event_marker = Some(marker.clone());
                self.persist_labels();
                self.submit(
                    "set_event_marker",
                    &marker.clone(),
                    Request::SetEventMarker(marker),
                );
            }
            Focus::Condition => {
                let condition = self.condition.trimmed().to_string();
                if condition.is_empty() {
                    self.status = "Condition is empty.".into();
                    return;
                }
                self.labels.condition = Some(condition.clone());
                self.persist_labels();
                self.submit(
                    "set_condition",
                    &condition.clone(),
                    Request::SetCondition(condition),
                );
            }
            Focus::None => {}
        }
    }

    fn persist_labels(&mut self) {
        if let Err(err) = self.labels.store() {
            self.status = format!("could not persist labels: {}", err);
        }
    }

    fn session_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Up => self.step_cursor = self.step_cursor.saturating_sub(1),
            KeyCode::Down => {
                if self.step_cursor + 1 < Step::ORDER.len() {
                    self.step_cursor += 1;
                }
            }
            KeyCode::Char(' ') => {
                let step = Step::ORDER[self.step_cursor];
                if self.session.is_complete(step) {
                    self.session.clear(step);
                    self.journal("step_reopened", step.title());
                } else {
                    self.session.mark_complete(step);
                    self.journal("step_complete", step.title());
                }
            }
            KeyCode::Char('l') | KeyCode::Enter => {
                self.worker.submit(Request::Surveys);
                self.status = "Loading surveys…".into();
            }
            KeyCode::Char('b') => self.submit(
                "start_biometric_baseline",
                "",
                Request::StartBiometricBaseline,
            ),
            KeyCode::Char('B') => self.submit(
                "stop_biometric_baseline",
                "",
                Request::StopBiometricBaseline,
            ),
            KeyCode::Char('u') => {
                let text = match self.session.next_pending() {
                    Some(step) => format!("next: {}", step.title()),
                    None => "protocol complete".to_string(),
                };
                self.submit("status_update", &text.clone(), Request::StatusUpdate(text));
            }
            _ => {}
        }
    }

    fn tasks_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('e') => self.submit("start_emotibit", "", Request::StartEmotibit),
            KeyCode::Char('E') => {
                let label = self.current_label();
                self.submit("stop_emotibit", &label.clone(), Request::StopEmotibit(label));
            }
            KeyCode::Char('r') => self.record_task_audio("start"),
            KeyCode::Char('R') => self.record_task_audio("stop"),
            KeyCode::Char('g') | KeyCode::Enter => {
                let label = self.current_label();
                let request = if label.is_empty() {
                    Request::RestTime(None)
                } else {
                    Request::RestTime(Some(label.clone()))
                };
                self.submit("rest_time", &label, request);
            }
            KeyCode::Char('k') => {
                let task_id = self.task_id.trimmed().to_string();
                if task_id.is_empty() {
                    self.status = "Task id is empty.".into();
                } else {
                    self.submit("complete_task", &task_id.clone(), Request::CompleteTask(task_id));
                }
            }
            KeyCode::Char('n') => self.submit("set_next_test", "", Request::NextTest),
            KeyCode::Char('s') => {
                self.timer.start();
                self.status = "Countdown running.".into();
            }
            KeyCode::Char('S') => {
                self.timer.stop();
                self.status = "Countdown paused.".into();
            }
            KeyCode::Char('z') => {
                self.timer.reset();
                self.status = "Countdown reset.".into();
            }
            _ => {}
        }
    }

    fn ser_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('f') => {
                self.worker.submit(Request::SerQuestion);
                self.status = "Fetching SER question…".into();
            }
            KeyCode::Char('n') | KeyCode::Enter => {
                self.worker.submit(Request::NextQuestion);
                self.status = "Fetching next question…".into();
            }
            KeyCode::Char('r') => self.submit("start_recording", "", Request::StartRecording),
            KeyCode::Char('R') => self.submit("stop_recording", "", Request::StopRecording),
            KeyCode::Char('a') => self.submit("process_ser_answer", "", Request::ProcessSerAnswer),
            KeyCode::Char('p') => self.submit("process_ser_test", "", Request::ProcessSerTest),
            KeyCode::Char('t') => {
                self.worker.submit(Request::Transcription);
                self.status = "Fetching transcription…".into();
            }
            _ => {}
        }
    }

    fn devices_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('f') | KeyCode::Enter => {
                self.worker.submit(Request::Devices);
                self.status = "Fetching capture devices…".into();
            }
            KeyCode::Up => self.device_cursor = self.device_cursor.saturating_sub(1),
            KeyCode::Down => {
                if self.device_cursor + 1 < self.devices.len() {
                    self.device_cursor += 1;
                }
            }
            KeyCode::Char('s') => {
                if let Some(device) = self.devices.get(self.device_cursor) {
                    let index = device.index;
                    self.submit("set_device", &index.to_string(), Request::SetDevice(index));
                } else {
                    self.status = "No device selected.".into();
                }
            }
            KeyCode::Char('p') => {
                self.worker.submit(Request::StreamActive);
                self.status = "Probing stream…".into();
            }
            KeyCode::Char('a') => self.submit("process_audio_files", "", Request::ProcessAudio),
            KeyCode::Char('m') => {
                self.submit("start_emotibit_stream", "", Request::StartEmotibitStream)
            }
            KeyCode::Char('x') => self.submit("shutdown", "", Request::Shutdown),
            _ => {}
        }
    }

    /// Label attached to EmotiBit pushes and baseline comparisons: the event
    /// marker when set, otherwise the task id.
    fn current_label(&self) -> String {
        let marker = self.event_marker.trimmed();
        if !marker.is_empty() {
            return marker.to_string();
        }
        self.task_id.trimmed().to_string()
    }

    fn record_task_audio(&mut self, action: &str) {
        let marker = self.event_marker.trimmed().to_string();
        if marker.is_empty() {
            self.status = "Event marker is required for task audio.".into();
            return;
        }
        let condition = {
            let value = self.condition.trimmed();
            (!value.is_empty()).then(|| value.to_string())
        };
        let question = self
            .question
            .as_ref()
            .map(|q| q.question.clone())
            .unwrap_or_default();
        let body = RecordTaskAudio {
            event_marker: marker.clone(),
            condition,
            action: action.to_string(),
            question,
        };
        self.submit(
            "record_task_audio",
            &format!("{} {}", action, marker),
            Request::RecordTaskAudio(body),
        );
    }
}

// --- drawing ---------------------------------------------------------------

fn draw(f: &mut Frame, app: &mut App) {
    let size = f.size();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(2),
        ])
        .split(size);
    draw_tabs(f, layout[0], app);
    match app.tab {
        Tab::Session => draw_session(f, layout[1], app),
        Tab::Tasks => draw_tasks(f, layout[1], app),
        Tab::Ser => draw_ser(f, layout[1], app),
        Tab::Devices => draw_devices(f, layout[1], app),
    }
    draw_status(f, layout[2], app);
}

fn draw_tabs(f: &mut Frame, area: Rect, app: &App) {
    let titles: Vec<Line> = Tab::all().iter().map(|t| Line::from(t.title())).collect();
    let tabs = Tabs::new(titles)
        .select(app.tab.index())
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("SOP — study operator panel"),
        );
    f.render_widget(tabs, area);
}

fn draw_session(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(area);

    let steps: Vec<ListItem> = Step::ORDER
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let mark = if app.session.is_complete(*step) {
                "[x]"
            } else {
                "[ ]"
            };
            let text = format!("{} {}", mark, step.title());
            let mut item = ListItem::new(text);
            if i == app.step_cursor {
                item = item.style(Style::default().fg(Color::Yellow));
            }
            item
        })
        .collect();
    let pending = app
        .session
        .next_pending()
        .map(|s| s.title())
        .unwrap_or("all complete");
    let checklist = List::new(steps).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Protocol — next: {}", pending)),
    );
    f.render_widget(checklist, chunks[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(7)])
        .split(chunks[1]);

    let surveys: Vec<ListItem> = if app.surveys.is_empty() {
        vec![ListItem::new("Press l (or Enter) to load surveys.")]
    } else {
        app.surveys
            .iter()
            .filter(|s| s.has_url())
            .map(|s| ListItem::new(format!("{} — {}", s.name, s.url)))
            .collect()
    };
    let survey_list =
        List::new(surveys).block(Block::default().borders(Borders::ALL).title("Surveys"));
    f.render_widget(survey_list, right[0]);

    let help = Paragraph::new(vec![
        Line::from("↑/↓ select step, Space toggles complete."),
        Line::from("l load surveys, u push progress to backend log"),
        Line::from("b start biometric baseline, B stop it"),
    ])
    .wrap(Wrap { trim: true })
    .block(Block::default().borders(Borders::ALL).title("Keys"));
    f.render_widget(help, right[1]);
}

fn draw_tasks(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(42), Constraint::Min(0)])
        .split(area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(4),
            Constraint::Length(4),
            Constraint::Min(0),
        ])
        .split(chunks[0]);
    render_input(f, rows[0], "Task id", &app.task_id, app.focus == Focus::TaskId);
    render_input(
        f,
        rows[1],
        "Event marker",
        &app.event_marker,
        app.focus == Focus::EventMarker,
    );
    render_input(
        f,
        rows[2],
        "Condition",
        &app.condition,
        app.focus == Focus::Condition,
    );
    let help = Paragraph::new(vec![
        Line::from("Tab cycles fields, Enter applies one."),
        Line::from("e EmotiBit start, E stop + push"),
        Line::from("r/R task audio start/stop"),
        Line::from("g rest-time decision"),
        Line::from("k complete task, n next test"),
        Line::from("s/S/z countdown start/pause/reset"),
    ])
    .wrap(Wrap { trim: true })
    .block(Block::default().borders(Borders::ALL).title("Keys"));
    f.render_widget(help, rows[3]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(0)])
        .split(chunks[1]);

    let clock = Paragraph::new(vec![
        Line::from(Span::styled(
            app.timer.display(),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(match app.timer.state() {
            sop_core::TimerState::Idle => "idle",
            sop_core::TimerState::Running => "running",
            sop_core::TimerState::Stopped => "stopped",
        }),
    ])
    .block(Block::default().borders(Borders::ALL).title("Countdown"));
    f.render_widget(clock, right[0]);

    let mut lines = vec![Line::from(format!(
        "Labels: marker={} condition={}",
        app.labels.event_marker.as_deref().unwrap_or("—"),
        app.labels.condition.as_deref().unwrap_or("—"),
    ))];
    match &app.rest {
        Some(decision) => {
            lines.push(Line::from(format!(
                "Rest: {} min (baseline {}, live {})",
                decision.rest_min, decision.baseline_count, decision.live_count
            )));
        }
        None => lines.push(Line::from("Rest: press g after a task window.")),
    }
    let body = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Task state"));
    f.render_widget(body, right[1]);
}

fn draw_ser(f: &mut Frame, area: Rect, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Min(0),
            Constraint::Length(6),
        ])
        .split(area);

    let question_text = match (&app.question, app.questions_done) {
        (Some(next), _) => format!("Test {}: {}", next.test_number, next.question),
        (None, true) => "No more questions.".to_string(),
        (None, false) => "Press n for the next question.".to_string(),
    };
    let question = Paragraph::new(question_text)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Question"));
    f.render_widget(question, rows[0]);

    let ser = Paragraph::new(
        app.ser_question
            .as_deref()
            .unwrap_or("Press f to fetch the SER question."),
    )
    .wrap(Wrap { trim: true })
    .block(Block::default().borders(Borders::ALL).title("SER question"));
    f.render_widget(ser, rows[1]);

    let transcription = Paragraph::new(
        app.transcription
            .as_deref()
            .unwrap_or("Press t after a recording to fetch the transcription."),
    )
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("Transcription"),
    );
    f.render_widget(transcription, rows[2]);

    let help = Paragraph::new(vec![
        Line::from("n next question (arms the microphone)"),
        Line::from("f SER question, a submit answer, p score SER test"),
        Line::from("r/R recording start/stop, t transcription"),
    ])
    .wrap(Wrap { trim: true })
    .block(Block::default().borders(Borders::ALL).title("Keys"));
    f.render_widget(help, rows[3]);
}

fn draw_devices(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    let devices: Vec<ListItem> = if app.devices.is_empty() {
        vec![ListItem::new("Press f (or Enter) to fetch devices.")]
    } else {
        app.devices
            .iter()
            .enumerate()
            .map(|(i, device)| {
                let mut item = ListItem::new(format!("{}: {}", device.index, device.name));
                if i == app.device_cursor {
                    item = item.style(Style::default().fg(Color::Yellow));
                }
                item
            })
            .collect()
    };
    let list = List::new(devices).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Capture devices"),
    );
    f.render_widget(list, chunks[0]);

    let stream = match app.stream_active {
        Some(true) => "stream: ACTIVE",
        Some(false) => "stream: inactive",
        None => "stream: unknown (press p)",
    };
    let body = Paragraph::new(vec![
        Line::from(stream),
        Line::from(""),
        Line::from("↑/↓ select device, s send selection"),
        Line::from("p probe biometric stream"),
        Line::from("m start EmotiBit stream"),
        Line::from("a process session audio files"),
        Line::from(Span::styled(
            "x shut the backend down",
            Style::default().fg(Color::Red),
        )),
    ])
    .wrap(Wrap { trim: true })
    .block(Block::default().borders(Borders::ALL).title("Backend"));
    f.render_widget(body, chunks[1]);
}

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
    let status = Paragraph::new(app.status.as_str())
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .wrap(Wrap { trim: true });
    f.render_widget(status, area);
}

fn render_input(f: &mut Frame, area: Rect, label: &str, field: &TextField, focused: bool) {
    let style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let paragraph = Paragraph::new(field.value.as_str())
        .style(style)
        .block(Block::default().borders(Borders::ALL).title(label));
    f.render_widget(paragraph, area);
    if focused {
        let cursor_x = area.x + 1 + field.value[..field.cursor].chars().count() as u16;
        let cursor_y = area.y + 1;
        f.set_cursor(cursor_x.min(area.right().saturating_sub(1)), cursor_y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(field: &mut TextField, code: KeyCode) {
        field.handle_key(&KeyEvent::new(code, KeyModifiers::NONE));
    }

    #[test]
    fn text_field_edits_multibyte_input() {
        let mut field = TextField::new("");
        press(&mut field, KeyCode::Char('é'));
        press(&mut field, KeyCode::Char('t'));
        press(&mut field, KeyCode::Char('é'));
        assert_eq!(field.value, "été");
        press(&mut field, KeyCode::Backspace);
        assert_eq!(field.value, "ét");
        press(&mut field, KeyCode::Left);
        press(&mut field, KeyCode::Left);
        press(&mut field, KeyCode::Delete);
        assert_eq!(field.value, "t");
        press(&mut field, KeyCode::Right);
        press(&mut field, KeyCode::Char('ü'));
        assert_eq!(field.value, "tü");
        assert_eq!(field.cursor, field.value.len());
    }
}
