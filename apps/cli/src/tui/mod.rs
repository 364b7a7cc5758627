mod events;
mod state;
mod ui;

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Result;
use crossterm::cursor::{Hide, Show};
use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use pulse::StatusProducer;
use ratatui::Terminal;
use ratatui::backend::{Backend, CrosstermBackend};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use events::KeyAction;
use state::DashboardState;

const KEY_POLL: Duration = Duration::from_millis(250);
const REDRAW_EVERY: Duration = Duration::from_secs(1);

/// Puts the terminal back on drop, so early returns and panics leave a usable shell
struct TerminalGuard<W: Write> {
    out: W,
    restored: bool,
}

impl<W: Write> TerminalGuard<W> {
    fn new(out: W) -> Self {
        Self { out, restored: false }
    }

    /// Raw mode, alternate screen, hidden cursor
    fn enter(out: W) -> io::Result<Self> {
        enable_raw_mode()?;
        let mut guard = Self::new(out);
        execute!(guard.out, EnterAlternateScreen, Hide)?;
        Ok(guard)
    }

    fn restore(&mut self) -> io::Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        let screen = execute!(self.out, Show, LeaveAlternateScreen);
        let raw_mode = disable_raw_mode();
        screen.and(raw_mode)
    }
}

impl<W: Write> Drop for TerminalGuard<W> {
    fn drop(&mut self) {
        if let Err(err) = self.restore() {
            warn!(error = %err, "restoring terminal failed");
        }
    }
}

/// Forward key presses from a blocking reader thread until `running` is cleared
fn spawn_key_reader(keys: mpsc::UnboundedSender<KeyEvent>, running: Arc<AtomicBool>) -> JoinHandle<()> {
    thread::spawn(move || {
        while running.load(Ordering::Relaxed) {
            match event::poll(KEY_POLL) {
                Ok(false) => {}
                Ok(true) => match event::read() {
                    Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                        if keys.send(key).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(error = %err, "reading terminal event failed");
                        break;
                    }
                },
                Err(err) => {
                    warn!(error = %err, "polling terminal events failed");
                    break;
                }
            }
        }
    })
}

/// Run the live dashboard until the user quits
pub async fn run(producer: StatusProducer, interval: Duration) -> Result<()> {
    let mut guard = TerminalGuard::enter(io::stdout())?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let (tx, mut keys) = mpsc::unbounded_channel();
    let running = Arc::new(AtomicBool::new(true));
    let reader = spawn_key_reader(tx, running.clone());

    let mut state = DashboardState::new(interval);
    let result = run_loop(&mut terminal, &producer, &mut state, &mut keys).await;

    running.store(false, Ordering::Relaxed);
    drop(terminal);
    let restored = guard.restore();
    if reader.join().is_err() {
        warn!("key reader thread panicked");
    }
    info!(ticks = state.ticks, uptime_secs = state.uptime().as_secs(), "dashboard stopped");

    result?;
    restored?;
    Ok(())
}

async fn run_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    producer: &StatusProducer,
    state: &mut DashboardState,
    keys: &mut mpsc::UnboundedReceiver<KeyEvent>,
) -> Result<()> {
    while !state.is_stopped() {
        state.begin_check();
        terminal.draw(|f| ui::render(f, state))?;

        let refresh = producer.refresh();
        tokio::pin!(refresh);
        let result = loop {
            tokio::select! {
                result = &mut refresh => break Some(result),
                Some(key) = keys.recv() => {
                    if events::handle_key(state, key) == KeyAction::Quit {
                        break None;
                    }
                }
            }
        };
        let Some(result) = result else { break };

        state.finish_check(result);
        debug!(tick = state.ticks, "dashboard refreshed");
        terminal.draw(|f| ui::render(f, state))?;

        let wait = tokio::time::sleep(state.interval);
        tokio::pin!(wait);
        let mut redraw = tokio::time::interval_at(tokio::time::Instant::now() + REDRAW_EVERY, REDRAW_EVERY);
        loop {
            tokio::select! {
                _ = &mut wait => break,
                _ = redraw.tick() => {
                    terminal.draw(|f| ui::render(f, state))?;
                }
                Some(key) = keys.recv() => match events::handle_key(state, key) {
                    KeyAction::Quit | KeyAction::Refresh => break,
                    KeyAction::None => {}
                }
            }
        }
    }

    Ok(())
}
