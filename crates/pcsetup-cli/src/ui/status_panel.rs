//! Status dashboard for one request.
//!
//! Header with the request status, an overall gauge, one line gauge per
//! computer, and the task log. Failed tasks list their resolution steps.

use pcsetup_core::{RequestStatus, TaskStatus};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, LineGauge, List, ListItem, Paragraph};

use crate::poller::PollEvent;
use crate::status_view::StatusView;

/// Everything the dashboard shows, folded from poll events.
#[derive(Debug, Clone, Default)]
pub struct WatchScreen {
    pub request_id: String,
    pub view: Option<StatusView>,
    pub last_error: Option<String>,
    pub session_ended: bool,
    pub updates: u64,
}

impl WatchScreen {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            ..Self::default()
        }
    }

    /// Fold one poll event into the screen.
    pub fn apply(&mut self, event: PollEvent) {
        match event {
            PollEvent::Updated(view) => {
                self.view = Some(view);
                self.last_error = None;
                self.updates += 1;
            }
            PollEvent::Failed { message, .. } => self.last_error = Some(message),
            PollEvent::SessionEnded { message, .. } => {
                self.last_error = Some(message);
                self.session_ended = true;
            }
        }
    }

    /// Nothing more will arrive: terminal status or session gone.
    pub fn is_finished(&self) -> bool {
        self.session_ended || self.view.as_ref().is_some_and(StatusView::is_terminal)
    }
}

/// Draw the dashboard into the whole frame.
pub fn draw(frame: &mut Frame<'_>, screen: &WatchScreen) {
    let computer_rows = screen.view.as_ref().map_or(0, |v| v.computers.len());
    let computer_height = u16::try_from(computer_rows).unwrap_or(u16::MAX).saturating_add(2).min(12);

    let [header, gauge, computers, logs, footer] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Length(computer_height),
        Constraint::Min(3),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    render_header(frame, header, screen);
    render_gauge(frame, gauge, screen.view.as_ref());
    render_computers(frame, computers, screen.view.as_ref());
    render_logs(frame, logs, screen.view.as_ref());
    render_footer(frame, footer, screen);
}

fn render_header(frame: &mut Frame<'_>, area: Rect, screen: &WatchScreen) {
    let (label, style) = screen.view.as_ref().map_or_else(
        || ("Loading...".to_string(), Style::default().fg(Color::DarkGray)),
        |v| (v.status_label().to_string(), status_style(v.status.as_ref())),
    );
    let mut spans = vec![
        Span::styled(
            screen.request_id.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(label, style),
    ];
    if let Some(elapsed) = screen.view.as_ref().and_then(|v| v.elapsed.as_ref()) {
        spans.push(Span::styled(
            format!("  elapsed {elapsed}"),
            Style::default().fg(Color::DarkGray),
        ));
    }
    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Setup request")
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(header, area);
}

fn render_gauge(frame: &mut Frame<'_>, area: Rect, view: Option<&StatusView>) {
    let (ratio, percent, style) = view.map_or((0.0, 0, Color::DarkGray), |v| {
        (v.progress / 100.0, v.percent, gauge_color(v))
    });
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Progress"))
        .gauge_style(Style::default().fg(style))
        .ratio(ratio.clamp(0.0, 1.0))
        .label(format!("{percent}%"))
        .use_unicode(true);
    frame.render_widget(gauge, area);
}

fn render_computers(frame: &mut Frame<'_>, area: Rect, view: Option<&StatusView>) {
    let block = Block::default().borders(Borders::ALL).title("Computers");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some(view) = view else {
        return;
    };
    let rows = Layout::vertical(vec![Constraint::Length(1); view.computers.len()]).split(inner);
    for (pc, row) in view.computers.iter().zip(rows.iter()) {
        let color = if pc.percent >= 100 {
            Color::Green
        } else {
            Color::Cyan
        };
        let gauge = LineGauge::default()
            .filled_style(Style::default().fg(color))
            .ratio((pc.progress / 100.0).clamp(0.0, 1.0))
            .label(format!("{:<16} {:>3}%", pc.name, pc.percent));
        frame.render_widget(gauge, *row);
    }
}

fn render_logs(frame: &mut Frame<'_>, area: Rect, view: Option<&StatusView>) {
    let block = Block::default().borders(Borders::ALL).title("Task log");
    let visible = usize::from(block.inner(area).height);

    let mut items: Vec<ListItem<'_>> = Vec::new();
    if let Some(view) = view {
        for log in &view.logs {
            let mut spans = vec![
                Span::styled(
                    format!("{} ", log.timestamp),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(format!("{} ", log.computer), Style::default().fg(Color::Cyan)),
                Span::raw(format!("{} ", log.task)),
                Span::styled(log.status.to_string(), task_style(&log.status)),
            ];
            if !log.message.is_empty() {
                spans.push(Span::raw(format!(": {}", log.message)));
            }
            if let Some(d) = &log.duration {
                spans.push(Span::styled(
                    format!(" ({d})"),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            let mut lines = vec![Line::from(spans)];
            lines.extend(log.resolution_steps.iter().map(|step| {
                Line::from(Span::styled(
                    format!("    - {step}"),
                    Style::default().fg(Color::Yellow),
                ))
            }));
            items.push(ListItem::new(lines));
        }
    }
    // Newest entries stay visible.
    let skip = items.len().saturating_sub(visible);
    let list = List::new(items.into_iter().skip(skip).collect::<Vec<_>>()).block(block);
    frame.render_widget(list, area);
}

fn render_footer(frame: &mut Frame<'_>, area: Rect, screen: &WatchScreen) {
    let line = match &screen.last_error {
        Some(err) => Line::from(Span::styled(
            format!("Error: {err}"),
            Style::default().fg(Color::Red),
        )),
        None if screen.is_finished() => Line::from(Span::styled(
            "Finished. q to quit",
            Style::default().fg(Color::DarkGray),
        )),
        None => Line::from(Span::styled(
            "q / Esc to stop watching",
            Style::default().fg(Color::DarkGray),
        )),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn gauge_color(view: &StatusView) -> Color {
    match view.status.as_ref() {
        Some(status) if status.is_success() => Color::Green,
        Some(status) if status.is_terminal() => Color::Red,
        _ => Color::Cyan,
    }
}

fn status_style(status: Option<&RequestStatus>) -> Style {
    let color = match status {
        Some(RequestStatus::Completed) => Color::Green,
        Some(RequestStatus::Warning | RequestStatus::Skipped | RequestStatus::Rollback) => {
            Color::Yellow
        }
        Some(
            RequestStatus::Failed
            | RequestStatus::PartiallyFailed
            | RequestStatus::RollbackFailed
            | RequestStatus::Rejected,
        ) => Color::Red,
        Some(RequestStatus::InProgress) => Color::Cyan,
        _ => Color::White,
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

fn task_style(status: &TaskStatus) -> Style {
    let color = match status {
        TaskStatus::Completed => Color::Green,
        TaskStatus::Failed | TaskStatus::RollbackFailed => Color::Red,
        TaskStatus::Warning | TaskStatus::Rollback | TaskStatus::Skipped => Color::Yellow,
        _ => Color::White,
    };
    Style::default().fg(color)
}
