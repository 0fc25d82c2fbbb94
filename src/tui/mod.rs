// TUI module - Terminal User Interface
//
// This module manages the terminal UI using ratatui. It handles:
// - Terminal initialization and cleanup
// - Event loop (keyboard input, timer ticks, request completions)
// - Routing keys to modals, global shortcuts, and the focused pane

pub mod app;
pub mod clipboard;
pub mod components;
pub mod editor;
pub mod modal;
pub mod theme;
pub mod ui;

use crate::config::Config;
use crate::coordinator::{Completion, Coordinator};
use crate::logging::LogBuffer;
use crate::runtime::Driver;
use anyhow::{Context, Result};
use app::{App, Focus};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use modal::{Modal, ModalAction};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::time::Duration;
use tokio::sync::mpsc;

/// Run the TUI
///
/// Sets up the terminal, runs the event loop, and restores the terminal
/// when done, whether the loop ended cleanly or not.
pub async fn run_tui(
    coordinator: Coordinator,
    driver: Driver,
    mut completions: mpsc::Receiver<Completion>,
    log_buffer: LogBuffer,
    config: Config,
) -> Result<()> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to setup terminal")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    let mut app = App::new(coordinator, driver, log_buffer, &config);
    app.start();

    let result = run_event_loop(&mut terminal, &mut app, &mut completions).await;

    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to restore terminal")?;
    terminal.show_cursor().context("Failed to show cursor")?;

    result
}

/// Main event loop
///
/// Waits on keyboard input, a redraw tick, and finished requests, handling
/// whichever arrives first.
async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    completions: &mut mpsc::Receiver<Completion>,
) -> Result<()> {
    let mut tick_interval = tokio::time::interval(Duration::from_millis(200));

    loop {
        terminal
            .draw(|f| ui::draw(f, app))
            .context("Failed to draw terminal")?;

        tokio::select! {
            _ = async {
                if event::poll(Duration::from_millis(10)).unwrap_or(false) {
                    if let Ok(Event::Key(key_event)) = event::read() {
                        handle_key_event(app, key_event);
                    }
                }
            } => {}

            _ = tick_interval.tick() => {
                app.tick();
            }

            Some(completion) = completions.recv() => {
                app.apply(completion);
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

/// Handle keyboard input
/// Layered dispatch: Modal → Global → Focused pane
fn handle_key_event(app: &mut App, key_event: KeyEvent) {
    if key_event.kind != KeyEventKind::Press {
        return;
    }

    // Layer 1: Modal captures all input when active
    if handle_modal_input(app, &key_event) {
        return;
    }

    // Layer 2: Global keys
    if handle_global_keys(app, &key_event) {
        return;
    }

    // Layer 3: Focused pane
    match app.focus {
        Focus::Files => match key_event.code {
            KeyCode::Up | KeyCode::Char('k') => app.select_previous(),
            KeyCode::Down | KeyCode::Char('j') => app.select_next(),
            KeyCode::Enter => app.open_selected(),
            KeyCode::Delete => app.prompt_delete(),
            _ => {}
        },
        Focus::Editor => {
            if !app.coordinator.session().is_editable() {
                return;
            }
            if app.editor.handle_key(key_event) {
                app.commit_edit();
            }
        }
    }
}

fn handle_modal_input(app: &mut App, key_event: &KeyEvent) -> bool {
    let Some(modal) = app.modal.as_mut() else {
        return false;
    };

    match modal.handle_input(key_event.code) {
        ModalAction::None => {}
        ModalAction::Close => app.modal = None,
        ModalAction::Create(title) => app.create_file(&title),
        ModalAction::Login(token) => app.login(&token),
        ModalAction::Resolve(choice) => app.resolve_unsaved(choice),
        ModalAction::ClearConfirmed => app.clear(),
        ModalAction::DeleteConfirmed(id) => app.delete(id),
        ModalAction::Acknowledge => app.acknowledge_expiry(),
    }
    true
}

fn handle_global_keys(app: &mut App, key_event: &KeyEvent) -> bool {
    if key_event.modifiers.contains(KeyModifiers::CONTROL) {
        match key_event.code {
            KeyCode::Char('q') | KeyCode::Char('c') => app.should_quit = true,
            KeyCode::Char('r') => app.run(),
            KeyCode::Char('t') => app.stop(),
            KeyCode::Char('s') => app.save(),
            KeyCode::Char('n') => app.prompt_new_file(),
            KeyCode::Char('l') => app.prompt_clear(),
            KeyCode::Char('d') => app.download(),
            KeyCode::Char('y') => app.copy_output(),
            KeyCode::Char('g') => app.modal = Some(Modal::login()),
            KeyCode::Char('o') => app.logout(),
            _ => return false,
        }
        return true;
    }

    match key_event.code {
        KeyCode::Tab => app.focus = app.focus.toggle(),
        KeyCode::F(1) => app.modal = Some(Modal::Help),
        KeyCode::F(2) => app.modal = Some(Modal::Logs),
        KeyCode::F(5) => app.refresh_files(),
        _ => return false,
    }
    true
}
