//! Main event loop for the TUI.
//!
//! Waits on four sources at once: termination signals, terminal input,
//! results from background tasks, and a periodic tick for timers.

use crate::app::{App, AppEvent};
use anyhow::Result;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Interval;

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

use super::input::{handle_key, handle_mouse};
use super::render::render;

const TICK: Duration = Duration::from_millis(250);

/// Whether the loop keeps running after an input event.
pub enum Action {
    Continue,
    Quit,
}

/// Raw mode, alternate screen and mouse capture for as long as it lives.
struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl Tui {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        Ok(Self {
            terminal: Terminal::new(CrosstermBackend::new(stdout))?,
        })
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        );
        let _ = self.terminal.show_cursor();
    }
}

/// One wake-up of the loop.
enum Wake {
    Input(Event),
    Task(AppEvent),
    Tick,
    Shutdown(&'static str),
}

struct Sources {
    input: EventStream,
    tasks: mpsc::Receiver<AppEvent>,
    tick: Interval,
    #[cfg(unix)]
    sigterm: Signal,
    #[cfg(unix)]
    sigint: Signal,
}

impl Sources {
    fn new(tasks: mpsc::Receiver<AppEvent>) -> Result<Self> {
        Ok(Self {
            input: EventStream::new(),
            tasks,
            tick: tokio::time::interval(TICK),
            #[cfg(unix)]
            sigterm: signal(SignalKind::terminate())?,
            #[cfg(unix)]
            sigint: signal(SignalKind::interrupt())?,
        })
    }

    async fn next(&mut self) -> Wake {
        #[cfg(unix)]
        let (sigterm, sigint) = (self.sigterm.recv(), self.sigint.recv());
        #[cfg(not(unix))]
        let (sigterm, sigint) = (
            std::future::pending::<Option<()>>(),
            std::future::pending::<Option<()>>(),
        );
        tokio::pin!(sigterm, sigint);

        loop {
            tokio::select! {
                biased;
                _ = &mut sigterm => return Wake::Shutdown("SIGTERM"),
                _ = &mut sigint => return Wake::Shutdown("SIGINT"),
                input = self.input.next() => match input {
                    Some(Ok(event)) => return Wake::Input(event),
                    Some(Err(e)) => tracing::warn!(error = %e, "Terminal event stream error"),
                    None => return Wake::Shutdown("input closed"),
                },
                Some(event) = self.tasks.recv() => return Wake::Task(event),
                _ = self.tick.tick() => return Wake::Tick,
            }
        }
    }
}

/// Runs the TUI until the user quits or a termination signal arrives.
///
/// A panic hook restores the terminal first, so a crash never leaves the
/// shell in raw mode with mouse capture on.
pub async fn run(app: &mut App, event_rx: mpsc::Receiver<AppEvent>) -> Result<()> {
    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        previous_hook(info);
    }));

    let mut tui = Tui::enter()?;
    let mut sources = Sources::new(event_rx)?;
    app.load_data();

    loop {
        // Finished background work first, so results are not starved by typing.
        while let Ok(event) = sources.tasks.try_recv() {
            app.handle_event(event);
        }
        if app.needs_redraw {
            tui.terminal.draw(|f| render(f, app))?;
            app.needs_redraw = false;
        }

        match sources.next().await {
            Wake::Shutdown(reason) => {
                tracing::info!(reason, "Shutting down");
                break;
            }
            Wake::Input(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                app.needs_redraw = true;
                if let Action::Quit = handle_key(app, key) {
                    break;
                }
            }
            Wake::Input(Event::Mouse(mouse)) => {
                if handle_mouse(app, mouse) {
                    app.needs_redraw = true;
                }
            }
            Wake::Input(Event::Resize(..)) => app.needs_redraw = true,
            Wake::Input(_) => {}
            Wake::Task(event) => app.handle_event(event),
            Wake::Tick => {
                app.on_tick();
                if app.summarizing.is_some() || app.fetching_original.is_some() {
                    app.needs_redraw = true;
                }
            }
        }
    }

    drop(tui);
    Ok(())
}
