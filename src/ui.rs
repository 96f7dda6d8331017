use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ledger_dedup::{
    format_minor, DeletionExecutor, DuplicateScanner, Phase, ReviewSession, UserContext,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

pub struct App<'a> {
    pub session: ReviewSession,
    pub state: TableState,
    pub status: String,
    scanner: &'a DuplicateScanner,
    executor: &'a DeletionExecutor,
    ctx: UserContext,
    shown_group: Option<usize>,
}

impl<'a> App<'a> {
    pub fn new(scanner: &'a DuplicateScanner, executor: &'a DeletionExecutor, ctx: UserContext) -> Self {
        Self {
            session: ReviewSession::new(),
            state: TableState::default(),
            status: String::new(),
            scanner,
            executor,
            ctx,
            shown_group: None,
        }
    }

    pub async fn start_scan(&mut self) {
        self.status = "Scanning...".to_string();
        self.status = match self.session.scan(self.scanner, &self.ctx).await {
            Ok(Phase::Complete) => "No duplicates found".to_string(),
            Ok(_) => String::new(),
            Err(e) => format!("{} (r to retry)", e),
        };
        self.sync_cursor();
    }

    /// Reset the row cursor whenever a different group becomes current
    fn sync_cursor(&mut self) {
        let index = self.session.current_index();
        if index != self.shown_group {
            self.shown_group = index;
            self.state.select(index.map(|_| 0));
        }
    }

    fn member_count(&self) -> usize {
        self.session.current_group().map_or(0, |g| g.len())
    }

    pub fn next(&mut self) {
        let len = self.member_count();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous_row(&mut self) {
        let len = self.member_count();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    fn highlighted_id(&self) -> Option<String> {
        let group = self.session.current_group()?;
        let row = self.state.selected()?;
        group.transactions.get(row).map(|t| t.id.clone())
    }

    /// Apply one key press. Returns true when the screen should close.
    pub async fn handle_key(&mut self, code: KeyCode) -> bool {
        match (self.session.phase(), code) {
            (_, KeyCode::Char('q')) | (_, KeyCode::Esc) => return true,
            (Phase::Complete, KeyCode::Enter) => return true,
            (Phase::Idle, KeyCode::Char('r')) => {
                self.start_scan().await;
                return false;
            }
            (Phase::Reviewing, KeyCode::Down) | (Phase::Reviewing, KeyCode::Char('j')) => self.next(),
            (Phase::Reviewing, KeyCode::Up) | (Phase::Reviewing, KeyCode::Char('k')) => self.previous_row(),
            (Phase::Reviewing, KeyCode::Char(' ')) => {
                if let Some(id) = self.highlighted_id() {
                    if let Err(e) = self.session.toggle(&id) {
                        self.status = e.to_string();
                    } else {
                        self.status.clear();
                    }
                }
            }
            (Phase::Reviewing, KeyCode::Char('a')) => {
                self.status = match self.session.keep_all() {
                    Ok(_) => "Kept all".to_string(),
                    Err(e) => e.to_string(),
                };
            }
            (Phase::Reviewing, KeyCode::Char('d')) => {
                self.status = "Deleting...".to_string();
                self.status = match self.session.delete_selected_and_advance(self.executor, &self.ctx).await {
                    Ok(_) => "Deleted selected transactions".to_string(),
                    Err(e) => e.to_string(),
                };
            }
            (Phase::Reviewing, KeyCode::Left) | (Phase::Reviewing, KeyCode::Char('p')) => {
                if let Err(e) = self.session.previous() {
                    self.status = e.to_string();
                }
            }
            _ => {}
        }
        self.sync_cursor();
        false
    }
}

pub async fn run_ui(app: &mut App<'_>) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

async fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App<'_>) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if app.handle_key(key.code).await {
                return Ok(());
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with progress
            Constraint::Min(0),    // Group / summary
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.session.phase() {
        Phase::Reviewing => render_group(f, chunks[1], app),
        Phase::Complete => render_summary(f, chunks[1], app),
        Phase::Idle | Phase::Scanning => render_message(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![Span::styled(
        "Duplicate Review",
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
    )];

    if let (Some(index), Some(summary)) = (app.session.current_index(), app.session.summary()) {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(
            format!("Group {}/{}", index + 1, summary.total_groups),
            Style::default().fg(Color::White),
        ));
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(
            format!("Resolved {}", summary.groups_resolved),
            Style::default().fg(Color::Green),
        ));
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("Deleted {}", summary.transactions_deleted),
            Style::default().fg(Color::Red),
        ));
    }

    let header = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));
    f.render_widget(header, area);
}

fn render_group(f: &mut Frame, area: Rect, app: &mut App) {
    let Some(group) = app.session.current_group() else {
        return;
    };

    let header_cells = ["", "Date", "Description", "Amount", "Category", "Counterparty"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).style(Style::default().bg(Color::DarkGray)).height(1);

    let rows: Vec<Row> = group
        .transactions
        .iter()
        .map(|tx| {
            let selected = app.session.is_selected(&tx.id);
            let (mark, color) = if selected {
                ("[x]", Color::Red)
            } else {
                ("[ ]", Color::White)
            };
            Row::new(vec![
                Cell::from(mark).style(Style::default().fg(color)),
                Cell::from(tx.event_date.to_string()),
                Cell::from(truncate(&tx.description, 34)),
                Cell::from(format_minor(tx.amount_minor)),
                Cell::from(truncate(tx.category_name.as_deref().unwrap_or("-"), 18)),
                Cell::from(truncate(tx.counterparty_name.as_deref().unwrap_or("-"), 18)),
            ])
            .style(Style::default().fg(color))
            .height(1)
        })
        .collect();

    let title = format!(
        " {} | confidence {} | {} ",
        group.account_name,
        group.confidence,
        group.breakdown.reason()
    );

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Length(12),
            Constraint::Length(36),
            Constraint::Length(12),
            Constraint::Length(20),
            Constraint::Length(20),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_summary(f: &mut Frame, area: Rect, app: &App) {
    let summary = app.session.summary().unwrap_or_default();

    let content = if summary.total_groups == 0 {
        vec![
            Line::from(""),
            Line::from(Span::styled(
                "  ✅ All clear - no duplicate transactions found",
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            )),
            Line::from(format!("     Scanned {} transactions", summary.scanned_transactions)),
        ]
    } else {
        vec![
            Line::from(""),
            Line::from(Span::styled(
                "  ✅ Review complete",
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            )),
            Line::from(format!(
                "     Groups resolved:      {}/{}",
                summary.groups_resolved, summary.total_groups
            )),
            Line::from(format!("     Transactions deleted: {}", summary.transactions_deleted)),
        ]
    };

    let paragraph = Paragraph::new(content).block(Block::default().borders(Borders::ALL).title(" Summary "));
    f.render_widget(paragraph, area);
}

fn render_message(f: &mut Frame, area: Rect, app: &App) {
    let text = match app.session.last_error() {
        Some(err) => Line::from(Span::styled(format!("  ❌ {}", err), Style::default().fg(Color::Red))),
        None => Line::from("  Scanning..."),
    };
    f.render_widget(Paragraph::new(vec![Line::from(""), text]).block(Block::default().borders(Borders::ALL)), area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let hints: &[(&str, &str)] = match app.session.phase() {
        Phase::Reviewing => &[
            ("Space", " Select | "),
            ("d", " Delete selected | "),
            ("a", " Keep all | "),
            ("p", " Previous | "),
            ("↑/↓", " Nav | "),
        ],
        Phase::Idle => &[("r", " Retry scan | ")],
        Phase::Complete => &[("Enter", " Done | ")],
        Phase::Scanning => &[],
    };

    let mut spans = vec![Span::raw(" ")];
    for (key, label) in hints {
        spans.push(Span::styled(*key, Style::default().fg(Color::Yellow)));
        spans.push(Span::raw(*label));
    }
    spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    spans.push(Span::raw(" Quit"));

    if !app.status.is_empty() {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(app.status.clone(), Style::default().fg(Color::Cyan)));
    }

    let status_bar = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::White)));
    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
