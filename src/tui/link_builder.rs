//! TUI for browsing the proxy list and building single links

use crate::config::Config;
use crate::proxy::{LivenessChecker, LivenessResult, LivenessStatus, ListFetcher, ListOrigin};
use crate::tui::session::{LinkSession, PAGE_SIZE};
use crate::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::debug;

/// Which pane receives key presses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Browse,
    Search,
    Form,
    ManualBug,
}

/// Link builder TUI application state
pub struct LinkBuilderApp {
    config: Config,
    session: LinkSession,
    checker: LivenessChecker,
    fetcher: ListFetcher,
    mode: Mode,
    /// Text typed while entering a manual bug host
    manual_bug: String,
    list_state: ListState,
    status_message: String,
    should_quit: bool,
}

impl LinkBuilderApp {
    pub fn new(config: Config) -> Result<Self> {
        let checker = LivenessChecker::with_config(config.checker_config())?;
        let fetcher = ListFetcher::with_config(config.fetcher_config())?;
        let session = LinkSession::new(Vec::new(), &config);
        let mut list_state = ListState::default();
        list_state.select(Some(0));

        Ok(Self {
            config,
            session,
            checker,
            fetcher,
            mode: Mode::Browse,
            manual_bug: String::new(),
            list_state,
            status_message: "Loading proxy list...".to_string(),
            should_quit: false,
        })
    }

    /// Last link generated during the session
    pub fn last_link(&self) -> Option<&str> {
        self.session.link()
    }

    /// Load the list, then run the TUI until the user quits
    pub async fn run(&mut self) -> Result<()> {
        let loaded = self.fetcher.load_or_builtin(&self.config.proxy_list_url).await;
        self.status_message = match loaded.origin {
            ListOrigin::Remote(strategy) => format!(
                "Loaded {} proxies via {}. Press '?' for keys.",
                loaded.records.len(),
                strategy
            ),
            ListOrigin::Builtin => {
                "Proxy list unavailable, showing the built-in proxy.".to_string()
            }
        };
        self.session.set_records(loaded.records);

        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.run_app(&mut terminal).await;

        // Restore terminal
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result
    }

    async fn run_app<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<LivenessResult>();
        self.check_visible(&tx);

        loop {
            terminal.draw(|f| self.ui(f))?;

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        let rows_changed = self.handle_input(key.code);
                        if self.should_quit {
                            break;
                        }
                        if rows_changed {
                            self.list_state.select(Some(self.session.cursor()));
                            self.check_visible(&tx);
                        }
                    }
                }
            }

            // Drain finished checks without blocking
            while let Ok(result) = rx.try_recv() {
                let key = result.record.key();
                if !self.session.apply_result(result) {
                    debug!("Dropped stale liveness result for {}", key);
                }
            }
        }

        Ok(())
    }

    fn check_visible(&mut self, tx: &mpsc::UnboundedSender<LivenessResult>) {
        let pending = self.session.begin_checks();
        if !pending.is_empty() {
            self.checker.spawn_checks(pending, tx.clone());
        }
    }

    /// Handle a key press; returns true when the visible rows changed
    fn handle_input(&mut self, key: KeyCode) -> bool {
        match self.mode {
            Mode::Browse => self.handle_browse(key),
            Mode::Search => self.handle_search(key),
            Mode::Form => {
                self.handle_form(key);
                false
            }
            Mode::ManualBug => {
                self.handle_manual_bug(key);
                false
            }
        }
    }

    fn handle_browse(&mut self, key: KeyCode) -> bool {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
                false
            }
            KeyCode::Down => {
                self.session.select_next();
                self.list_state.select(Some(self.session.cursor()));
                false
            }
            KeyCode::Up => {
                self.session.select_prev();
                self.list_state.select(Some(self.session.cursor()));
                false
            }
            KeyCode::Right | KeyCode::Char('n') => self.session.next_page(),
            KeyCode::Left | KeyCode::Char('p') => self.session.prev_page(),
            KeyCode::Char('/') => {
                self.mode = Mode::Search;
                self.status_message = "Search: type a provider or country, Enter to finish.".to_string();
                false
            }
            KeyCode::Enter => {
                if let Some(record) = self.session.selected_record() {
                    self.status_message = format!(
                        "Building a link for {} | p:protocol t:tls b:bug m:manual bug w:wildcard d:domain u:new uuid g:generate Esc:back",
                        record.label()
                    );
                    self.mode = Mode::Form;
                }
                false
            }
            KeyCode::Char('?') => {
                self.status_message =
                    "Up/Down:select  Left/Right:page  /:search  Enter:build link  q:quit".to_string();
                false
            }
            _ => false,
        }
    }

    fn handle_search(&mut self, key: KeyCode) -> bool {
        match key {
            KeyCode::Enter | KeyCode::Esc => {
                self.mode = Mode::Browse;
                self.status_message = format!("{} matching proxies.", self.session.filtered_len());
                false
            }
            KeyCode::Backspace => {
                self.session.pop_search_char();
                true
            }
            KeyCode::Char(c) => {
                self.session.push_search_char(c);
                true
            }
            _ => false,
        }
    }

    fn handle_form(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc => {
                self.mode = Mode::Browse;
                self.status_message = "Press '?' for keys.".to_string();
            }
            KeyCode::Char('p') => self.session.cycle_protocol(),
            KeyCode::Char('t') => self.session.toggle_tls(),
            KeyCode::Char('b') => self.session.cycle_bug(),
            KeyCode::Char('d') => self.session.cycle_domain(),
            KeyCode::Char('u') => {
                let identity = self.session.regenerate_identity().to_string();
                self.status_message = format!("New UUID: {}", identity);
            }
            KeyCode::Char('w') => {
                if !self.session.toggle_wildcard() {
                    self.status_message = "Wildcard needs a preset bug host.".to_string();
                }
            }
            KeyCode::Char('m') => {
                self.manual_bug.clear();
                self.mode = Mode::ManualBug;
                self.status_message = "Manual bug host(s), comma-separated. Enter to finish.".to_string();
            }
            KeyCode::Char('g') | KeyCode::Enter => {
                self.status_message = match self.session.generate() {
                    Some(_) => "Link generated. It is printed again when you quit.".to_string(),
                    None => "No proxy selected.".to_string(),
                };
            }
            _ => {}
        }
    }

    fn handle_manual_bug(&mut self, key: KeyCode) {
        match key {
            KeyCode::Enter | KeyCode::Esc => {
                self.session.set_manual_bug(&self.manual_bug);
                self.mode = Mode::Form;
                self.status_message = format!("Bug: {}", self.session.form().bug.label());
            }
            KeyCode::Backspace => {
                self.manual_bug.pop();
            }
            KeyCode::Char(c) => self.manual_bug.push(c),
            _ => {}
        }
    }

    fn ui(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3), // Title
                Constraint::Min(0),    // Proxy list + form
                Constraint::Length(5), // Generated link
                Constraint::Length(3), // Status bar
            ])
            .split(f.size());

        let title = Paragraph::new(self.config.ui_title.clone())
            .style(Style::default().fg(Color::Cyan))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(title, chunks[0]);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);

        self.render_proxy_list(f, body[0]);
        self.render_form(f, body[1]);

        let link = Paragraph::new(self.session.link().unwrap_or("").to_string())
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Link"));
        f.render_widget(link, chunks[2]);

        let status = Paragraph::new(self.status_message.clone())
            .style(Style::default().fg(Color::Yellow))
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Status"));
        f.render_widget(status, chunks[3]);
    }

    fn render_proxy_list(&mut self, f: &mut Frame, area: Rect) {
        let page = self.session.page();
        let items: Vec<ListItem> = self
            .session
            .visible()
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let (badge, color) = match self.session.status_of(record) {
                    Some(LivenessStatus::Active { latency_ms }) => {
                        (format!("ACTIVE {}ms", latency_ms), Color::Green)
                    }
                    Some(LivenessStatus::Dead) => ("DEAD".to_string(), Color::Red),
                    Some(LivenessStatus::Unknown) => ("UNKNOWN".to_string(), Color::Gray),
                    Some(LivenessStatus::Checking) | None => ("...".to_string(), Color::Yellow),
                };
                let content = format!(
                    "{:>3}. {:<21} {:<12} {}",
                    page * PAGE_SIZE + i + 1,
                    record.key(),
                    badge,
                    record.label()
                );
                ListItem::new(content).style(Style::default().fg(color))
            })
            .collect();

        let search = if self.session.search().is_empty() {
            String::new()
        } else {
            format!(" | search: {}", self.session.search())
        };
        let block_title = format!(
            "Proxies ({}) page {}/{}{}",
            self.session.filtered_len(),
            page + 1,
            self.session.page_count(),
            search
        );
        let border_style = if matches!(self.mode, Mode::Browse | Mode::Search) {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(block_title)
                    .border_style(border_style),
            )
            .highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol(">> ");

        f.render_stateful_widget(list, area, &mut self.list_state);
    }

    fn render_form(&self, f: &mut Frame, area: Rect) {
        let form = self.session.form();
        let bug = if self.mode == Mode::ManualBug {
            format!("Manual: {}_", self.manual_bug)
        } else {
            form.bug.label()
        };
        let lines = [
            format!("[p] Protocol : {}", form.protocol.label()),
            format!("[t] TLS      : {}", if form.tls { "on" } else { "off" }),
            format!("[b] Bug      : {}", bug),
            format!("[w] Wildcard : {}", if form.wildcard { "on" } else { "off" }),
            format!("[d] Domain   : {}", self.session.main_domain()),
            format!("[u] UUID     : {}", self.session.identity()),
            String::new(),
            "[g] Generate".to_string(),
        ]
        .join("\n");

        let border_style = if matches!(self.mode, Mode::Form | Mode::ManualBug) {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };

        let form = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
            Block::default()
                .borders(Borders::ALL)
                .title("Options")
                .border_style(border_style),
        );
        f.render_widget(form, area);
    }
}
