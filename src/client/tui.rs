//! Terminal dashboard: summary charts on top, the filterable and
//! sortable connection table below, a status bar with the active view
//! settings, and an error banner when polling fails.

use std::time::Duration;

use crossterm::{
    event, execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Borders, Cell, Paragraph, Row, Table};
use tokio::sync::mpsc;

use crate::client::charts::{
    self, MatrixChart, ShareSlice, flag_color, protocol_color, state_color,
};
use crate::client::poll::{PollCommand, SharedSnapshot, Snapshot};
use crate::client::view::{self, SortColumn, SortDirection, ViewState};
use crate::types::Connection;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InputMode {
    Normal,
    Searching,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyOutcome {
    Quit,
    Command(PollCommand),
    Handled,
}

/// UI-side state: the view settings plus input/scroll bookkeeping.
/// Lives only for the session.
pub struct App {
    pub view: ViewState,
    input_mode: InputMode,
    search_buffer: String,
    scroll: usize,
    auto_refresh: bool,
}

impl Default for App {
    fn default() -> Self {
        Self {
            view: ViewState::default(),
            input_mode: InputMode::Normal,
            search_buffer: String::new(),
            scroll: 0,
            auto_refresh: true,
        }
    }
}

impl App {
    pub fn handle_key(&mut self, code: event::KeyCode, snapshot: &Snapshot) -> KeyOutcome {
        use event::KeyCode;

        if self.input_mode == InputMode::Searching {
            match code {
                KeyCode::Esc => {
                    self.input_mode = InputMode::Normal;
                    self.search_buffer.clear();
                    self.view.search.clear();
                }
                KeyCode::Enter => {
                    self.input_mode = InputMode::Normal;
                }
                KeyCode::Backspace => {
                    self.search_buffer.pop();
                    self.view.search = self.search_buffer.clone();
                }
                KeyCode::Char(c) => {
                    self.search_buffer.push(c);
                    self.view.search = self.search_buffer.clone();
                }
                _ => {}
            }
            self.scroll = 0;
            return KeyOutcome::Handled;
        }

        match code {
            KeyCode::Char('q') | KeyCode::Char('Q') => return KeyOutcome::Quit,
            KeyCode::Char('r') => return KeyOutcome::Command(PollCommand::RefreshNow),
            KeyCode::Char('a') => {
                self.auto_refresh = !self.auto_refresh;
                return KeyOutcome::Command(PollCommand::SetAutoRefresh(self.auto_refresh));
            }
            KeyCode::Char('/') => {
                self.input_mode = InputMode::Searching;
                self.search_buffer = self.view.search.clone();
            }
            KeyCode::Char('p') => {
                let protocols = view::distinct_values(&snapshot.connections, |c| &c.protocol);
                self.view.protocol_filter =
                    view::cycle_filter(&self.view.protocol_filter, &protocols);
                self.scroll = 0;
            }
            KeyCode::Char('s') => {
                let states = view::distinct_values(&snapshot.connections, |c| &c.state);
                self.view.state_filter = view::cycle_filter(&self.view.state_filter, &states);
                self.scroll = 0;
            }
            KeyCode::Char('l') => {
                self.view.cycle_limit();
                self.scroll = 0;
            }
            KeyCode::Char('c') => {
                self.view.search.clear();
                self.view.protocol_filter = None;
                self.view.state_filter = None;
                self.scroll = 0;
            }
            KeyCode::Char(c @ '1'..='9') => {
                let idx = (c as usize) - ('1' as usize);
                self.view.toggle_sort(SortColumn::ALL[idx]);
                self.scroll = 0;
            }
            KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
            KeyCode::Down => self.scroll = self.scroll.saturating_add(1),
            KeyCode::PageUp => self.scroll = self.scroll.saturating_sub(20),
            KeyCode::PageDown => self.scroll = self.scroll.saturating_add(20),
            KeyCode::Home => self.scroll = 0,
            _ => {}
        }
        KeyOutcome::Handled
    }

    fn searching(&self) -> bool {
        self.input_mode == InputMode::Searching
    }
}

/// Run the dashboard until quit. The poller owns the data; this loop
/// only reads snapshots and dispatches commands.
pub async fn run(
    shared: SharedSnapshot,
    commands: mpsc::Sender<PollCommand>,
) -> std::io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::default();
    let result = event_loop(&mut terminal, &mut app, &shared, &commands).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    let _ = commands.send(PollCommand::Shutdown).await;
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut App,
    shared: &SharedSnapshot,
    commands: &mpsc::Sender<PollCommand>,
) -> std::io::Result<()> {
    loop {
        let snapshot = shared.read().await.clone();
        terminal.draw(|f| draw(f, app, &snapshot))?;

        if event::poll(Duration::from_millis(250))? {
            if let event::Event::Key(key) = event::read()? {
                if key.kind != event::KeyEventKind::Press {
                    continue;
                }
                match app.handle_key(key.code, &snapshot) {
                    KeyOutcome::Quit => return Ok(()),
                    KeyOutcome::Command(cmd) => {
                        let _ = commands.send(cmd).await;
                    }
                    KeyOutcome::Handled => {}
                }
            }
        }
    }
}

fn draw(f: &mut ratatui::Frame, app: &App, snapshot: &Snapshot) {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // stats header
            Constraint::Length(1),  // error banner
            Constraint::Length(12), // charts
            Constraint::Min(5),     // table
            Constraint::Length(3),  // status bar
        ])
        .split(f.area());

    draw_header(f, outer[0], app, snapshot);
    draw_banner(f, outer[1], snapshot);
    draw_charts(f, outer[2], snapshot);
    draw_table(f, outer[3], app, snapshot);
    draw_status(f, outer[4], app);
}

fn draw_header(f: &mut ratatui::Frame, area: Rect, app: &App, snapshot: &Snapshot) {
    let summary = &snapshot.summary;
    let last_update = snapshot
        .last_update
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    let auto = if app.auto_refresh { "on (5s)" } else { "off" };
    let host = snapshot.host.as_deref().unwrap_or("-");

    let line = Line::from(vec![
        Span::styled(
            format!(" {} connections ", summary.total_connections),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            "| {} protocols | {} states ",
            summary.by_protocol.len(),
            summary.by_state.len()
        )),
        Span::styled(
            format!("| host {host} | updated {last_update} | auto-refresh {auto}"),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    let header = Paragraph::new(line)
        .block(Block::default().borders(Borders::ALL).title("conndash"));
    f.render_widget(header, area);
}

fn draw_banner(f: &mut ratatui::Frame, area: Rect, snapshot: &Snapshot) {
    if let Some(err) = &snapshot.error {
        let banner = Paragraph::new(format!(" {err}"))
            .style(Style::default().fg(Color::White).bg(Color::Red));
        f.render_widget(banner, area);
    }
}

fn draw_charts(f: &mut ratatui::Frame, area: Rect, snapshot: &Snapshot) {
    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(18),
            Constraint::Percentage(15),
            Constraint::Percentage(17),
            Constraint::Percentage(17),
            Constraint::Percentage(16),
            Constraint::Percentage(17),
        ])
        .split(area);

    let summary = &snapshot.summary;
    draw_protocol_share(f, panes[0], &charts::protocol_share(&summary.by_protocol));
    draw_bars(f, panes[1], "States", &charts::count_bars(&summary.by_state));
    draw_bars(f, panes[2], "Top Source IPs", &charts::ip_bars(&summary.top_source_ips));
    draw_bars(
        f,
        panes[3],
        "Top Dest IPs",
        &charts::ip_bars(&summary.top_destination_ips),
    );
    draw_bars(
        f,
        panes[4],
        "Top Dest Ports",
        &charts::port_bars(&summary.top_destination_ports),
    );
    draw_matrix(f, panes[5], &charts::matrix_chart(&summary.protocol_state_matrix));
}

/// Protocol share as one full-width band plus a legend, the terminal
/// take on the doughnut chart.
fn draw_protocol_share(f: &mut ratatui::Frame, area: Rect, slices: &[ShareSlice]) {
    let block = Block::default().borders(Borders::ALL).title("Protocols");
    let inner = block.inner(area);
    f.render_widget(block, area);
    if slices.is_empty() || inner.height == 0 {
        return;
    }

    let width = inner.width as usize;
    let mut band: Vec<Span> = Vec::new();
    let mut used = 0usize;
    for (i, slice) in slices.iter().enumerate() {
        let mut cells = (slice.percent / 100.0 * width as f64).round() as usize;
        if i == slices.len() - 1 {
            cells = width.saturating_sub(used);
        }
        cells = cells.min(width - used);
        if cells > 0 {
            band.push(Span::styled(
                "\u{2588}".repeat(cells),
                Style::default().fg(slice.color),
            ));
            used += cells;
        }
    }

    let mut lines = vec![Line::from(band)];
    for slice in slices.iter().take(inner.height.saturating_sub(1) as usize) {
        lines.push(Line::from(vec![
            Span::styled("\u{25cf} ", Style::default().fg(slice.color)),
            Span::raw(format!("{} {} ({:.1}%)", slice.label, slice.count, slice.percent)),
        ]));
    }
    f.render_widget(Paragraph::new(lines), inner);
}

fn draw_bars(f: &mut ratatui::Frame, area: Rect, title: &str, data: &[(String, u64)]) {
    let visible = area.height.saturating_sub(2) as usize;
    let bars: Vec<Bar> = data
        .iter()
        .take(visible)
        .enumerate()
        .map(|(i, (label, value))| {
            Bar::default()
                .value(*value)
                .label(Line::from(label.clone()))
                .style(Style::default().fg(charts::palette_color(i)))
                .text_value(value.to_string())
        })
        .collect();
    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0)
        .data(BarGroup::default().bars(&bars));
    f.render_widget(chart, area);
}

/// The protocol x state matrix as grouped vertical bars, one group per
/// protocol, states colored consistently across groups.
fn draw_matrix(f: &mut ratatui::Frame, area: Rect, matrix: &MatrixChart) {
    let groups: Vec<(String, Vec<Bar>)> = matrix
        .groups
        .iter()
        .map(|(protocol, values)| {
            let bars = values
                .iter()
                .zip(&matrix.states)
                .filter(|(v, _)| **v > 0)
                .map(|(value, (state, color))| {
                    Bar::default()
                        .value(*value)
                        .style(Style::default().fg(*color))
                        .text_value(state.chars().take(3).collect())
                })
                .collect();
            (protocol.clone(), bars)
        })
        .collect();

    let mut chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title("Proto x State"))
        .bar_width(3)
        .bar_gap(1)
        .group_gap(2);
    for (protocol, bars) in &groups {
        chart = chart.data(
            BarGroup::default()
                .label(Line::from(protocol.clone()))
                .bars(bars),
        );
    }
    f.render_widget(chart, area);
}

fn header_cell(app: &App, column: SortColumn) -> Cell<'static> {
    let indicator = match app.view.sort {
        Some((c, SortDirection::Ascending)) if c == column => " \u{25b2}",
        Some((c, SortDirection::Descending)) if c == column => " \u{25bc}",
        _ => "",
    };
    Cell::from(Span::styled(
        format!("{}{}", column.label(), indicator),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    ))
}

fn flags_cell(conn: &Connection) -> Cell<'static> {
    match conn.flags.as_deref() {
        Some(flags) if flags != "-" && !flags.is_empty() => {
            let mut spans = Vec::new();
            for (i, flag) in flags.split(',').map(str::trim).enumerate() {
                if i > 0 {
                    spans.push(Span::raw(" "));
                }
                spans.push(Span::styled(
                    flag.to_string(),
                    Style::default().fg(flag_color(flag)).add_modifier(Modifier::BOLD),
                ));
            }
            Cell::from(Line::from(spans))
        }
        _ => Cell::from("-"),
    }
}

fn draw_table(f: &mut ratatui::Frame, area: Rect, app: &App, snapshot: &Snapshot) {
    let filtered = view::apply(&snapshot.connections, &app.view);
    let (shown, hidden) = view::limited(&filtered, app.view.limit);

    let visible_height = area.height.saturating_sub(3) as usize;
    let scroll = app.scroll.min(shown.len().saturating_sub(visible_height));

    let header = Row::new(SortColumn::ALL.map(|c| header_cell(app, c))).height(1);

    let rows: Vec<Row> = shown
        .iter()
        .skip(scroll)
        .take(visible_height)
        .map(|conn| {
            let protocol = conn.protocol.to_uppercase();
            Row::new(vec![
                Cell::from(Span::styled(
                    protocol.clone(),
                    Style::default()
                        .fg(protocol_color(&conn.protocol))
                        .add_modifier(Modifier::BOLD),
                )),
                Cell::from(Span::styled(
                    conn.state.clone(),
                    Style::default().fg(state_color(&conn.state)),
                )),
                Cell::from(conn.src.clone()),
                Cell::from(conn.sport_display().to_string()),
                Cell::from(conn.dst.clone()),
                Cell::from(conn.dport_display().to_string()),
                flags_cell(conn),
                Cell::from(conn.mark_display().to_string()),
                Cell::from(conn.use_display().to_string()),
            ])
        })
        .collect();

    let footer = if filtered.is_empty() {
        "no connections match the current filters".to_string()
    } else if hidden > 0 {
        format!(
            "showing {} of {} connections ({} hidden, press l to raise the limit)",
            shown.len(),
            filtered.len(),
            hidden
        )
    } else {
        format!("showing all {} connections", filtered.len())
    };

    let table = Table::new(
        rows,
        [
            Constraint::Length(7),
            Constraint::Length(12),
            Constraint::Length(16),
            Constraint::Length(6),
            Constraint::Length(16),
            Constraint::Length(6),
            Constraint::Min(12),
            Constraint::Length(5),
            Constraint::Length(4),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("Connections")
            .title_bottom(Line::from(footer).style(Style::default().fg(Color::DarkGray))),
    );
    f.render_widget(table, area);
}

fn draw_status(f: &mut ratatui::Frame, area: Rect, app: &App) {
    let sort = match app.view.sort {
        Some((column, SortDirection::Ascending)) => format!("{} asc", column.label()),
        Some((column, SortDirection::Descending)) => format!("{} desc", column.label()),
        None => "none".to_string(),
    };
    let limit = match app.view.limit {
        Some(n) => n.to_string(),
        None => "all".to_string(),
    };
    let search = if app.searching() {
        format!("typing: {}", app.search_buffer)
    } else if app.view.search.is_empty() {
        "<none>".to_string()
    } else {
        app.view.search.clone()
    };

    let status = format!(
        "search {search} | proto {} | state {} | sort {sort} | limit {limit}  \
         [/] search [p]roto [s]tate [1-9] sort [l]imit [c]lear [r]efresh [a]uto [q]uit",
        app.view.protocol_filter.as_deref().unwrap_or("all"),
        app.view.state_filter.as_deref().unwrap_or("all"),
    );
    let bar = Paragraph::new(status)
        .block(Block::default().borders(Borders::ALL).title("View"))
        .style(Style::default().fg(if app.searching() {
            Color::Yellow
        } else {
            Color::Cyan
        }));
    f.render_widget(bar, area);
}
