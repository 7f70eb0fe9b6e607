//! Live dashboard showing probe progress as results arrive

use crate::proxy::{ProbeEvent, ProbeResult, StopSignal};
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
    widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::collections::VecDeque;
use std::io;
use tokio::sync::mpsc::{error::TryRecvError, UnboundedReceiver};
use tokio::time::Duration;

/// Maximum number of recent results kept per column
const MAX_RECENT: usize = 100;

/// Dashboard state, fed by a `ChannelObserver`
pub struct ProbeDashboard {
    events: UnboundedReceiver<ProbeEvent>,
    stop: StopSignal,
    total: usize,
    checked: usize,
    working_count: usize,
    failed_count: usize,
    recent_working: VecDeque<ProbeResult>,
    recent_failed: VecDeque<ProbeResult>,
    /// 0 = working column, 1 = failed column
    selected_list: usize,
    list_state: ListState,
    status_message: String,
    is_complete: bool,
    failed: bool,
    should_quit: bool,
}

impl ProbeDashboard {
    pub fn new(events: UnboundedReceiver<ProbeEvent>, stop: StopSignal) -> Self {
        let mut list_state = ListState::default();
        list_state.select(Some(0));

        Self {
            events,
            stop,
            total: 0,
            checked: 0,
            working_count: 0,
            failed_count: 0,
            recent_working: VecDeque::new(),
            recent_failed: VecDeque::new(),
            selected_list: 0,
            list_state,
            status_message: "Loading candidates... Press 'q' to stop.".to_string(),
            is_complete: false,
            failed: false,
            should_quit: false,
        }
    }

    /// Take over the terminal until the user quits
    pub async fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.run_app(&mut terminal).await;

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
        loop {
            terminal.draw(|f| self.ui(f))?;

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_input(key.code);
                        if self.should_quit {
                            break;
                        }
                    }
                }
            }

            self.drain_events();
            tokio::task::yield_now().await;
        }

        Ok(())
    }

    /// Apply every event queued since the last frame
    fn drain_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(event) => self.apply(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.is_complete {
                        self.finish(None);
                    }
                    break;
                }
            }
        }
    }

    fn apply(&mut self, event: ProbeEvent) {
        match event {
            ProbeEvent::Started { total } => {
                self.total = total;
            }
            ProbeEvent::Completed(result) => {
                self.checked += 1;

                let (recent, count) = if result.is_working() {
                    (&mut self.recent_working, &mut self.working_count)
                } else {
                    (&mut self.recent_failed, &mut self.failed_count)
                };
                *count += 1;
                recent.push_back(result);
                if recent.len() > MAX_RECENT {
                    recent.pop_front();
                }
            }
            ProbeEvent::Finished { error } => {
                self.finish(error);
            }
        }

        if !self.is_complete {
            self.status_message = format!(
                "Checking... {}% ({}/{}) | Working: {} | Failed: {}",
                self.percent(),
                self.checked,
                self.total,
                self.working_count,
                self.failed_count
            );
        }
    }

    fn finish(&mut self, error: Option<String>) {
        self.is_complete = true;
        self.status_message = match error {
            Some(error) => {
                self.failed = true;
                format!("Failed: {} | Press 'q' to quit", error)
            }
            None => format!(
                "Complete! Checked: {} | Working: {} | Failed: {} | Press 'q' to quit",
                self.checked, self.working_count, self.failed_count
            ),
        };
    }

    fn percent(&self) -> u16 {
        if self.total > 0 {
            (self.checked as f64 / self.total as f64 * 100.0) as u16
        } else {
            0
        }
    }

    fn handle_input(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => {
                if !self.is_complete {
                    self.stop.trigger();
                }
                self.should_quit = true;
            }
            KeyCode::Tab => {
                self.selected_list = (self.selected_list + 1) % 2;
                self.list_state.select(Some(0));
            }
            KeyCode::Down => {
                let len = self.selected_len();
                let i = match self.list_state.selected() {
                    Some(i) if i + 1 < len => i + 1,
                    _ => 0,
                };
                self.list_state.select(Some(i));
            }
            KeyCode::Up => {
                let len = self.selected_len();
                let i = match self.list_state.selected() {
                    Some(0) | None => len.saturating_sub(1),
                    Some(i) => i - 1,
                };
                self.list_state.select(Some(i));
            }
            _ => {}
        }
    }

    fn selected_len(&self) -> usize {
        if self.selected_list == 0 {
            self.recent_working.len()
        } else {
            self.recent_failed.len()
        }
    }

    fn ui(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3), // Title
                Constraint::Length(3), // Progress bar
                Constraint::Min(0),    // Result lists
                Constraint::Length(3), // Status bar
            ])
            .split(f.size());

        let title = Paragraph::new("Proxy Sieve")
            .style(Style::default().fg(Color::Cyan))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(title, chunks[0]);

        let progress = self.percent().min(100);
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("Progress"))
            .gauge_style(Style::default().fg(Color::Green).bg(Color::Black))
            .percent(progress)
            .label(format!("{}/{} ({}%)", self.checked, self.total, progress));
        f.render_widget(gauge, chunks[1]);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[2]);

        Self::render_result_list(
            f,
            columns[0],
            "Working",
            &self.recent_working,
            self.working_count,
            Color::Green,
            if self.selected_list == 0 { Some(&mut self.list_state) } else { None },
        );
        Self::render_result_list(
            f,
            columns[1],
            "Failed",
            &self.recent_failed,
            self.failed_count,
            Color::Red,
            if self.selected_list == 1 { Some(&mut self.list_state) } else { None },
        );

        let status = Paragraph::new(self.status_message.clone())
            .style(if self.failed {
                Style::default().fg(Color::Red)
            } else if self.is_complete {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Yellow)
            })
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Status"));
        f.render_widget(status, chunks[3]);
    }

    fn render_result_list(
        f: &mut Frame,
        area: Rect,
        title: &str,
        results: &VecDeque<ProbeResult>,
        total_count: usize,
        color: Color,
        list_state: Option<&mut ListState>,
    ) {
        let items: Vec<ListItem> = results
            .iter()
            .rev() // Newest first
            .map(|result| ListItem::new(describe(result)).style(Style::default().fg(color)))
            .collect();

        let border_style = if list_state.is_some() {
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
                    .title(format!("{} ({})", title, total_count))
                    .border_style(border_style),
            )
            .highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol(">> ");

        if let Some(state) = list_state {
            f.render_stateful_widget(list, area, state);
        } else {
            f.render_widget(list, area);
        }
    }
}

fn describe(result: &ProbeResult) -> String {
    match (result.latency, result.failure()) {
        (_, Some(failure)) => format!("{} ({})", result.candidate, failure),
        (Some(latency), None) => format!("{} ({:.2}s)", result.candidate, latency.as_secs_f64()),
        (None, None) => result.candidate.to_string(),
    }
}
