//! Front ends for the status poller.
//!
//! The dashboard reads terminal input on a dedicated OS thread and does
//! everything else on the tokio runtime. `--plain` prints one block of lines
//! per update instead.

use std::io::{self, Write};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::dispatch::{Command, Controller};
use crate::poller::PollEvent;
use crate::ui::{self, WatchScreen};

/// Print status updates until the request finishes or Ctrl+C.
pub async fn run_plain(controller: &mut Controller, request_id: String) -> anyhow::Result<()> {
    let (events_tx, mut events) = mpsc::channel(16);
    controller
        .dispatch(Command::Watch {
            request_id,
            events: events_tx,
        })
        .await?;

    let result = loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(PollEvent::Updated(view)) => {
                    let mut out = io::stdout();
                    for line in view.to_lines() {
                        writeln!(out, "{line}")?;
                    }
                    writeln!(out)?;
                    if view.is_terminal() {
                        break Ok(());
                    }
                }
                Some(PollEvent::Failed { message, .. }) => {
                    writeln!(io::stdout(), "Error: {message} (retrying)")?;
                }
                Some(PollEvent::SessionEnded { message, .. }) => {
                    break Err(anyhow::anyhow!(message));
                }
                None => break Ok(()),
            },
            _ = tokio::signal::ctrl_c() => break Ok(()),
        }
    };

    controller.dispatch(Command::StopWatching).await?;
    result
}

/// Terminal events forwarded from the reader thread.
enum TermEvent {
    Key(KeyEvent),
    Resize,
}

/// Full-screen dashboard. Polling stops once the request is finished; the
/// screen stays until the user quits.
pub async fn run_dashboard(controller: &mut Controller, request_id: String) -> anyhow::Result<()> {
    let (events_tx, mut events) = mpsc::channel(16);
    controller
        .dispatch(Command::Watch {
            request_id: request_id.clone(),
            events: events_tx,
        })
        .await?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let cancel = CancellationToken::new();
    let (term_tx, mut term_rx) = mpsc::channel::<TermEvent>(64);
    let reader_cancel = cancel.clone();
    let reader = std::thread::spawn(move || {
        while !reader_cancel.is_cancelled() {
            // Poll with a timeout so cancellation is noticed.
            if !event::poll(Duration::from_millis(50)).unwrap_or(false) {
                continue;
            }
            let forwarded = match event::read() {
                Ok(Event::Key(key)) if matches!(key.kind, KeyEventKind::Press) => {
                    term_tx.blocking_send(TermEvent::Key(key))
                }
                Ok(Event::Resize(..)) => term_tx.blocking_send(TermEvent::Resize),
                _ => Ok(()),
            };
            if forwarded.is_err() {
                break;
            }
        }
    });

    let mut screen = WatchScreen::new(request_id);
    let mut polling = true;
    let mut tick = tokio::time::interval(Duration::from_millis(100));

    let result: anyhow::Result<()> = loop {
        tokio::select! {
            _ = tick.tick() => {
                if let Err(e) = terminal.draw(|f| ui::draw(f, &screen)) {
                    break Err(e.into());
                }
            }
            Some(term_event) = term_rx.recv() => {
                if matches!(term_event, TermEvent::Key(key) if is_quit_key(key)) {
                    break Ok(());
                }
            }
            Some(event) = events.recv(), if polling => {
                screen.apply(event);
                if screen.is_finished() {
                    debug!(request_id = %screen.request_id, "request finished, polling stopped");
                    polling = false;
                    if let Err(e) = controller.dispatch(Command::StopWatching).await {
                        break Err(e.into());
                    }
                }
            }
        }
    };

    cancel.cancel();
    let _ = reader.join(); // fast: the reader polls every 50ms

    let _ = disable_raw_mode();
    let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
    let _ = terminal.show_cursor();

    if polling {
        controller.dispatch(Command::StopWatching).await?;
    }

    if screen.session_ended {
        anyhow::bail!(
            "{}",
            screen
                .last_error
                .unwrap_or_else(|| "Session ended".to_string())
        );
    }
    result
}

fn is_quit_key(key: KeyEvent) -> bool {
    matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
        || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
}
