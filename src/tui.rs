use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

use crate::client::{FetchError, ListingSource};
use crate::config::Config;
use crate::controller::{Controller, FetchRequest, Phase};
use crate::detail::{self, DetailView};
use crate::models::Fetched;

pub const EMPTY_MESSAGE: &str = "No jobs found. Please try adjusting your search or filters.";

type FetchOutcome = (u64, Result<Fetched, FetchError>);

enum Mode {
    Browse,
    Search(String),
}

struct AppState {
    controller: Controller,
    mode: Mode,
    detail: Option<DetailView>,
    detail_width: usize,
    detail_scroll: u16,
    window_delta: usize,
    via: String,
    source: Arc<dyn ListingSource>,
    tx: Sender<FetchOutcome>,
}

impl AppState {
    /// Run the fetch on a worker thread; the result comes back tagged with
    /// its generation so a late answer to an old query is dropped.
    fn dispatch(&self, request: FetchRequest) {
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = request.run(&*source);
            let _ = tx.send((request.generation, result));
        });
    }

    fn drain(&mut self, rx: &Receiver<FetchOutcome>) {
        while let Ok((generation, result)) = rx.try_recv() {
            self.controller.complete(generation, result);
        }
    }

    fn open_detail(&mut self) {
        if self.controller.open_detail() {
            self.detail_scroll = 0;
            self.detail = self.build_detail_view();
        }
    }

    fn close_detail(&mut self) {
        self.controller.close_detail();
        self.detail = None;
    }

    /// Keep the overlay text wrapped to the current overlay width. The view
    /// is only rebuilt when that width changes.
    fn fit_detail(&mut self, width: usize) {
        if width == self.detail_width {
            return;
        }
        self.detail_width = width;
        if self.detail.is_some() {
            self.detail = self.build_detail_view();
        }
    }

    fn build_detail_view(&self) -> Option<DetailView> {
        self.controller
            .selected()
            .map(|listing| DetailView::new(listing, &self.via, self.detail_width))
    }

    fn scroll_down(&mut self) {
        self.detail_scroll = self.detail_scroll.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.detail_scroll = self.detail_scroll.saturating_sub(3);
    }
}

pub fn run_board(
    config: &Config,
    source: Arc<dyn ListingSource>,
    term: &str,
    category: Option<&str>,
) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let mut state = AppState {
        controller: Controller::new(config.page_size).with_query(term, category),
        mode: Mode::Browse,
        detail: None,
        detail_width: 0,
        detail_scroll: 0,
        window_delta: config.window_delta,
        via: config.via.clone(),
        source,
        tx,
    };
    let request = state.controller.mount();
    state.dispatch(request);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, &rx);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    rx: &Receiver<FetchOutcome>,
) -> Result<()> {
    let mut list_state = ListState::default();

    loop {
        state.drain(rx);
        list_state.select(if state.controller.page_result().items.is_empty() {
            None
        } else {
            Some(state.controller.cursor())
        });
        let size = terminal.size()?;
        state.fit_detail(overlay_width(Rect::new(0, 0, size.width, size.height)));
        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        if is_interrupt(&key) {
            break;
        }

        if let Mode::Search(buffer) = &mut state.mode {
            match key.code {
                KeyCode::Enter => {
                    let term = std::mem::take(buffer);
                    state.mode = Mode::Browse;
                    let request = state.controller.submit_search(&term);
                    state.dispatch(request);
                }
                KeyCode::Esc => state.mode = Mode::Browse,
                KeyCode::Backspace => {
                    buffer.pop();
                }
                KeyCode::Char(c) => buffer.push(c),
                _ => {}
            }
            continue;
        }

        if state.controller.selected().is_some() {
            match key.code {
                KeyCode::Esc | KeyCode::Char('q') | KeyCode::Enter => state.close_detail(),
                KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('J') | KeyCode::PageDown => {
                    state.scroll_down()
                }
                KeyCode::Up | KeyCode::Char('k') | KeyCode::Char('K') | KeyCode::PageUp => {
                    state.scroll_up()
                }
                _ => {}
            }
            continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => break,
            KeyCode::Char('/') => {
                state.mode = Mode::Search(state.controller.term().to_string());
            }
            KeyCode::Down | KeyCode::Char('j') => state.controller.move_cursor(1),
            KeyCode::Up | KeyCode::Char('k') => state.controller.move_cursor(-1),
            KeyCode::Right | KeyCode::Char('l') => {
                state.controller.next_page();
            }
            KeyCode::Left | KeyCode::Char('h') => {
                state.controller.prev_page();
            }
            KeyCode::Char('g') | KeyCode::Home => {
                state.controller.first_page();
            }
            KeyCode::Char('G') | KeyCode::End => {
                state.controller.last_page();
            }
            KeyCode::Char('c') => {
                let request = state.controller.cycle_category(true);
                state.dispatch(request);
            }
            KeyCode::Char('C') => {
                let request = state.controller.cycle_category(false);
                state.dispatch(request);
            }
            KeyCode::Char('r') => {
                let request = state.controller.refresh();
                state.dispatch(request);
            }
            KeyCode::Enter => state.open_detail(),
            _ => {}
        }
        debug!(page = state.controller.page(), cursor = state.controller.cursor(), "key handled");
    }
    info!("board closed");
    Ok(())
}

/// Raw mode swallows SIGINT, so Ctrl+C arrives as a key press.
fn is_interrupt(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c')
}

fn overlay_width(screen: Rect) -> usize {
    centered(80, 85, screen).width.saturating_sub(4) as usize
}

fn draw(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    frame.render_widget(build_header(state), chunks[0]);
    draw_listings(frame, state, list_state, chunks[1]);
    frame.render_widget(Paragraph::new(build_pager(state)).alignment(Alignment::Center), chunks[2]);
    frame.render_widget(Paragraph::new(build_status(state)), chunks[3]);

    let help = match (&state.mode, state.controller.selected().is_some()) {
        (Mode::Search(_), _) => " Enter:search  Esc:cancel",
        (_, true) => " j/k:scroll  Esc/q:close",
        _ => " /:search  c/C:category  j/k:move  h/l:page  g/G:first/last  Enter:details  r:reload  q:quit",
    };
    frame.render_widget(
        Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
        chunks[4],
    );

    if let Some(view) = &state.detail {
        let area = centered(80, 85, frame.area());
        let body = Paragraph::new(build_detail(view))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!(" {} ", view.title)),
            )
            .wrap(Wrap { trim: false })
            .scroll((state.detail_scroll, 0));
        frame.render_widget(Clear, area);
        frame.render_widget(body, area);
    }
}

fn build_header(state: &AppState) -> Paragraph<'static> {
    let search = match &state.mode {
        Mode::Search(buffer) => Span::styled(
            format!("{}_", buffer),
            Style::default().fg(Color::Yellow),
        ),
        Mode::Browse if state.controller.term().is_empty() => {
            Span::styled("(any)", Style::default().fg(Color::DarkGray))
        }
        Mode::Browse => Span::raw(state.controller.term().to_string()),
    };
    let category = state
        .controller
        .category()
        .map(str::to_string)
        .unwrap_or_else(|| "All Categories".to_string());

    let line = Line::from(vec![
        Span::styled("Search: ", Style::default().add_modifier(Modifier::BOLD)),
        search,
        Span::raw("   "),
        Span::styled("Category: ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(category),
        Span::styled(
            format!("  ({} available)", state.controller.categories().len()),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Remote Job Board "),
    )
}

fn draw_listings(frame: &mut Frame, state: &AppState, list_state: &mut ListState, area: Rect) {
    let page = state.controller.page_result();
    let block = Block::default().borders(Borders::ALL).title(format!(
        " Jobs ({}) ",
        state.controller.listings().len()
    ));

    if page.items.is_empty() {
        let message = if state.controller.is_empty_result() {
            Span::styled(EMPTY_MESSAGE, Style::default().fg(Color::Yellow))
        } else if state.controller.is_loading() {
            Span::raw("Loading...")
        } else {
            Span::styled(
                "Nothing to show yet.",
                Style::default().fg(Color::DarkGray),
            )
        };
        frame.render_widget(
            Paragraph::new(message)
                .alignment(Alignment::Center)
                .block(block),
            area,
        );
        return;
    }

    let items: Vec<ListItem> = page
        .items
        .iter()
        .map(|job| {
            let company = detail::or_not_provided(Some(job.company_name.as_str()));
            let salary = detail::or_not_provided(job.salary.as_deref());
            let published = detail::format_published(job.published);
            ListItem::new(vec![
                Line::from(Span::styled(
                    job.title.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(vec![
                    Span::styled(company, Style::default().fg(Color::Cyan)),
                    Span::raw(format!("  Salary: {}  Published: {}", salary, published)),
                ]),
            ])
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, list_state);
}

fn build_pager(state: &AppState) -> Line<'static> {
    let total = state.controller.total_pages();
    if total == 0 {
        return Line::default();
    }
    let current = state.controller.page();
    let dim = Style::default().fg(Color::DarkGray);
    let first_style = if current == 1 { dim } else { Style::default() };
    let last_style = if current == total { dim } else { Style::default() };

    let mut spans = vec![Span::styled("« ‹ ", first_style)];
    for page in state.controller.window(state.window_delta) {
        if page == current {
            spans.push(Span::styled(
                format!("[{}]", page),
                Style::default().fg(Color::Black).bg(Color::Cyan),
            ));
        } else {
            spans.push(Span::raw(format!(" {} ", page)));
        }
    }
    spans.push(Span::styled(" › »", last_style));
    spans.push(Span::styled(format!("   Page {} of {}", current, total), dim));
    Line::from(spans)
}

fn build_status(state: &AppState) -> Line<'static> {
    let controller = &state.controller;
    match controller.phase() {
        Phase::Idle => Line::default(),
        Phase::Loading => Line::from(Span::styled(
            " Searching...",
            Style::default().fg(Color::Yellow),
        )),
        Phase::Error(message) => Line::from(Span::styled(
            format!(" Search failed: {} (press r to retry)", message),
            Style::default().fg(Color::Red),
        )),
        Phase::Loaded => {
            let mut text = format!(" {} jobs", controller.listings().len());
            if controller.rejected_count() > 0 {
                text.push_str(&format!(", {} malformed skipped", controller.rejected_count()));
            }
            Line::from(Span::styled(text, Style::default().fg(Color::Green)))
        }
    }
}

fn build_detail(view: &DetailView) -> Text<'static> {
    let mut lines: Vec<Line> = Vec::new();

    for (label, value) in &view.fields {
        lines.push(Line::from(vec![
            Span::styled(format!("{}: ", label), Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(value.clone()),
        ]));
    }
    lines.push(Line::from(""));

    lines.push(Line::from(Span::styled(
        "Job description",
        Style::default().add_modifier(Modifier::BOLD),
    )));
    if view.description.is_empty() {
        lines.push(Line::from(Span::styled(
            "(No description provided)",
            Style::default().fg(Color::DarkGray),
        )));
    } else {
        for line in &view.description {
            lines.push(Line::from(line.clone()));
        }
    }
    lines.push(Line::from(""));

    lines.push(Line::from(vec![
        Span::styled("Apply: ", Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(view.apply_url.clone(), Style::default().fg(Color::Cyan)),
    ]));

    Text::from(lines)
}

fn centered(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
