use std::io::stdout;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::Terminal;

use crate::campaign::{column_index, DisplayOptions, COUNTDOWN_COLUMN};
use crate::classify::StatusFilter;
use crate::config::Settings;
use crate::controller::RefreshController;
use crate::renderer;
use crate::source::{DataSource, FetchEvent, Poller};
use crate::table::CampaignTable;

/// Longest the loop waits for input before checking the timers again.
const MAX_POLL: Duration = Duration::from_millis(100);

/// Build the table model from the table options, ignoring (with a warning)
/// column keys that do not exist.
pub fn build_table(settings: &Settings) -> CampaignTable {
    let options = &settings.table;
    let sort_column = column_index(&options.sort_column).unwrap_or_else(|| {
        tracing::warn!(column = %options.sort_column, "Unknown sort column, sorting by countdown");
        COUNTDOWN_COLUMN
    });

    let hidden_columns = options
        .hidden_columns
        .iter()
        .filter_map(|key| {
            let index = column_index(key);
            if index.is_none() {
                tracing::warn!(column = %key, "Ignoring unknown hidden column");
            }
            index
        })
        .collect();

    CampaignTable::new(
        DisplayOptions {
            datetime_format: settings.datetime_format.clone(),
        },
        sort_column,
        options.sort_descending,
        hidden_columns,
    )
}

/// Main application state and run loop.
pub struct App {
    pub controller: RefreshController<CampaignTable>,
    poller: Poller,
    fetch_rx: Receiver<FetchEvent>,
    source_label: String,
    yes: String,
    no: String,
    pub running: bool,
    /// Position of the selected row within the visible rows.
    pub selected: usize,
    /// Table rows that fit on screen, as of the last draw.
    pub page_rows: u16,
    /// Whether the search input bar is actively accepting keystrokes.
    pub search_active: bool,
    /// The current search query string.
    pub search_query: String,
    /// One-off message shown in the legend (e.g. a failed link open).
    pub notice: Option<String>,
}

impl App {
    pub fn new(settings: &Settings, filter: StatusFilter, source: Arc<dyn DataSource>) -> Self {
        let mut controller = RefreshController::new(build_table(settings), settings);
        controller.set_status_filter(filter);

        let source_label = source.describe();
        let (poller, fetch_rx) = Poller::new(source);

        Self {
            controller,
            poller,
            fetch_rx,
            source_label,
            yes: settings.translations.yes.clone(),
            no: settings.translations.no.clone(),
            running: true,
            selected: 0,
            page_rows: 0,
            search_active: false,
            search_query: String::new(),
            notice: None,
        }
    }

    /// Fetch the initial dataset on the calling thread and start the timers.
    pub fn start(&mut self) {
        let started = Instant::now();
        let initial = self.poller.fetch_now();
        tracing::info!(
            source = %self.source_label,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = initial.is_ok(),
            "Initial fetch finished"
        );
        self.controller.startup(initial, Instant::now());
    }

    /// Run the main TUI event loop.
    pub fn run(&mut self) -> Result<()> {
        // 1. Initial data, before the terminal is taken over.
        self.start();

        // 2. Set up the terminal.
        enable_raw_mode()?;
        let mut out = stdout();
        execute!(out, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(out);
        let mut terminal = Terminal::new(backend)?;

        // 3. Main loop.
        let result = self.event_loop(&mut terminal);

        // 4. Cleanup, restore the terminal even when the loop failed.
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        while self.running {
            // --- Draw ---
            let mut page_rows: u16 = 0;
            terminal.draw(|frame| {
                page_rows = renderer::render_ui(
                    frame,
                    &self.controller,
                    &self.source_label,
                    self.selected,
                    &self.search_query,
                    self.search_active,
                    self.notice.as_deref(),
                    (&self.yes, &self.no),
                );
            })?;
            self.page_rows = page_rows;

            // --- Handle keyboard events ---
            let wait = self
                .controller
                .time_until_next(Instant::now())
                .min(MAX_POLL);
            if event::poll(wait)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key);
                    }
                }
            }

            // --- Apply finished fetches (non-blocking) ---
            self.drain_fetches();

            // --- Timers ---
            if self.controller.advance(Instant::now()) {
                self.poller.spawn_fetch();
            }
        }
        Ok(())
    }

    /// Apply every fetch that completed since the last iteration.
    pub fn drain_fetches(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.fetch_rx.try_recv() {
            self.controller.on_fetch(event);
            applied += 1;
        }
        if applied > 0 {
            self.clamp_selection();
        }
        applied
    }

    fn visible_len(&self) -> usize {
        self.controller.table().visible().len()
    }

    fn clamp_selection(&mut self) {
        self.selected = self.selected.min(self.visible_len().saturating_sub(1));
    }

    fn select_by(&mut self, delta: isize) {
        let last = self.visible_len().saturating_sub(1);
        self.selected = self.selected.saturating_add_signed(delta).min(last);
    }

    fn open_selected(&mut self) {
        let table = self.controller.table();
        let link = table
            .visible()
            .get(self.selected)
            .and_then(|index| table.row(*index))
            .and_then(|row| row.data.link());

        self.notice = match link {
            Some(url) => match open::that(&url) {
                Ok(()) => Some(format!("Opened {}", url)),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Could not open link");
                    Some(format!("Could not open {}: {}", url, e))
                }
            },
            None => Some("No link for this campaign".to_string()),
        };
    }

    /// Handle one key press.
    pub fn handle_key(&mut self, key: KeyEvent) {
        // Ctrl+C always quits, regardless of search state.
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.running = false;
            return;
        }

        self.notice = None;
        let half_page = (self.page_rows / 2).max(1) as isize;

        if self.search_active {
            // Search input mode: typing into the search bar.
            match key.code {
                KeyCode::Esc => {
                    self.search_active = false;
                    self.search_query.clear();
                }
                KeyCode::Enter => {
                    self.search_active = false;
                }
                KeyCode::Backspace => {
                    self.search_query.pop();
                }
                KeyCode::Char(c) => {
                    self.search_query.push(c);
                }
                _ => return,
            }
            self.controller.set_search(&self.search_query);
            self.clamp_selection();
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => self.running = false,
            KeyCode::Esc if !self.controller.search().is_empty() => {
                self.search_query.clear();
                self.controller.set_search("");
                self.clamp_selection();
            }
            KeyCode::Char('/') => {
                self.search_active = true;
            }
            KeyCode::Char('f') => {
                let next = self.controller.status_filter().cycle();
                self.controller.set_status_filter(next);
                self.clamp_selection();
            }
            KeyCode::Char('o') | KeyCode::Enter => self.open_selected(),
            KeyCode::Char('j') | KeyCode::Down => self.select_by(1),
            KeyCode::Char('k') | KeyCode::Up => self.select_by(-1),
            KeyCode::PageDown => self.select_by(half_page),
            KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.select_by(half_page)
            }
            KeyCode::PageUp => self.select_by(-half_page),
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.select_by(-half_page)
            }
            KeyCode::Char('g') | KeyCode::Home => self.selected = 0,
            KeyCode::Char('G') | KeyCode::End => {
                self.selected = self.visible_len().saturating_sub(1);
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
