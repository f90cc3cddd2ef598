//! TUI application state and event loop.
//!
//! The relay worker runs as a background task; its observer forwards
//! events into an unbounded channel the UI drains between frames.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};
use tokio::sync::{mpsc, watch};

use aoirelay_core::pipeline::PipelineObserver;
use aoirelay_core::poller::run_poller;
use aoirelay_shared::{
    RecordEvent, RelayError, RunContext, load_config, validate_config,
};

use crate::widgets::status_bar;

/// Most log lines retained in the scrollback.
const LOG_CAPACITY: usize = 200;

// ---------------------------------------------------------------------------
// Pipeline → UI bridge
// ---------------------------------------------------------------------------

/// Events forwarded from the pipeline to the UI loop.
pub(crate) enum UiEvent {
    Cycle { candidates: usize },
    Record(Box<RecordEvent>),
    Failure { file_name: String, message: String },
    Notice(String),
}

/// Forwards pipeline callbacks into the UI channel. Fire-and-forget: a
/// closed channel never blocks or fails the worker.
struct ChannelObserver {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl PipelineObserver for ChannelObserver {
    fn cycle_started(&self, candidates: usize) {
        let _ = self.tx.send(UiEvent::Cycle { candidates });
    }

    fn record_processed(&self, event: &RecordEvent) {
        let _ = self.tx.send(UiEvent::Record(Box::new(event.clone())));
    }

    fn file_failed(&self, file_name: &str, error: &RelayError) {
        let _ = self.tx.send(UiEvent::Failure {
            file_name: file_name.to_string(),
            message: error.to_string(),
        });
    }

    fn notice(&self, message: &str) {
        let _ = self.tx.send(UiEvent::Notice(message.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// Application state: last record fields, scrollback, status line.
pub(crate) struct App {
    machine_name: String,
    input_dir: String,
    serial_number: String,
    work_order: String,
    program: String,
    status: String,
    side: String,
    log: VecDeque<String>,
    status_line: String,
    alert: bool,
    should_quit: bool,
}

impl App {
    fn new(ctx: &RunContext) -> Self {
        Self {
            machine_name: ctx.machine_name.clone(),
            input_dir: ctx.input_dir.display().to_string(),
            serial_number: String::new(),
            work_order: String::new(),
            program: String::new(),
            status: String::new(),
            side: String::new(),
            log: VecDeque::new(),
            status_line: format!("Watching {}", ctx.input_dir.display()),
            alert: false,
            should_quit: false,
        }
    }

    fn push_log(&mut self, line: String) {
        if self.log.len() == LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back(line);
    }

    fn apply(&mut self, event: UiEvent) {
        match event {
            UiEvent::Cycle { candidates } => {
                if candidates > 0 {
                    self.push_log(format!("Cycle: {candidates} file(s) found"));
                }
            }
            UiEvent::Record(record) => {
                self.serial_number = record.serial_number.clone();
                self.work_order = record.work_order.clone().unwrap_or_default();
                self.program = record.program.clone();
                self.status = record.status.to_string();
                self.side = record.side.to_string();
                self.alert = false;
                self.status_line = format!("Processed {}", record.file_name);
                self.push_log(format!(
                    "{}: {} {} ({})",
                    record.file_name, record.serial_number, record.status, record.program
                ));
            }
            UiEvent::Failure { file_name, message } => {
                self.push_log(format!("{file_name}: {message}"));
            }
            UiEvent::Notice(message) => {
                self.alert = true;
                self.status_line = message.clone();
                self.push_log(message);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Entry point — starts the worker, sets up the terminal, runs the event
/// loop, restores the terminal, and stops the worker.
pub(crate) async fn run() -> Result<()> {
    let config = load_config()?;
    validate_config(&config)?;
    let ctx = Arc::new(RunContext::from(&config));
    ctx.ensure_directories()?;

    let (ui_tx, ui_rx) = mpsc::unbounded_channel();
    let (_ctx_tx, ctx_rx) = watch::channel(ctx.clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let observer: Arc<dyn PipelineObserver> = Arc::new(ChannelObserver { tx: ui_tx });
    let poller = tokio::spawn(run_poller(ctx_rx, shutdown_rx, observer));

    // Setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run app
    let result = run_app(&mut terminal, App::new(&ctx), ui_rx);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    // Stop the worker; cancellation takes effect at the cycle boundary.
    let _ = shutdown_tx.send(true);
    let _ = poller.await;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut app: App,
    mut ui_rx: mpsc::UnboundedReceiver<UiEvent>,
) -> Result<()> {
    loop {
        while let Ok(ui_event) = ui_rx.try_recv() {
            app.apply(ui_event);
        }

        terminal.draw(|f| draw(f, &app))?;

        // Poll for input with 100ms timeout for responsive UI
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                handle_key(&mut app, key.code, key.modifiers);
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn handle_key(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
            app.should_quit = true;
        }
        KeyCode::Char('q') | KeyCode::Esc => {
            app.should_quit = true;
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(7), // Last record
            Constraint::Min(1),    // Log
            Constraint::Length(1), // Status bar
        ])
        .split(f.area());

    let header = Paragraph::new(format!(
        " Machine: {}    Watching: {}",
        app.machine_name, app.input_dir
    ))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(" AOI Relay "),
    );
    f.render_widget(header, chunks[0]);

    let record_lines = vec![
        Line::from(format!("  Serial Number: {}", app.serial_number)),
        Line::from(format!("  Work Order:    {}", app.work_order)),
        Line::from(format!("  Program:       {}", app.program)),
        Line::from(format!("  Status:        {}", app.status)),
        Line::from(format!("  Side:          {}", app.side)),
    ];
    let record = Paragraph::new(record_lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Last Record "),
    );
    f.render_widget(record, chunks[1]);

    // Tail of the scrollback that fits the log area.
    let visible = chunks[2].height.saturating_sub(2) as usize;
    let skip = app.log.len().saturating_sub(visible);
    let log_lines: Vec<Line> = app
        .log
        .iter()
        .skip(skip)
        .map(|l| Line::from(l.as_str()))
        .collect();
    let log = Paragraph::new(log_lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Log — q to quit "),
    );
    f.render_widget(log, chunks[2]);

    let bar = status_bar(&app.status_line, app.alert);
    f.render_widget(bar, chunks[3]);
}
