use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::tui::state::DashboardState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    None,
    Refresh,
    Quit,
}

/// Map a key press onto the loop; quitting also stops the state
pub fn handle_key(state: &mut DashboardState, key: KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            state.stop();
            KeyAction::Quit
        }
        KeyCode::Char('q') | KeyCode::Esc => {
            state.stop();
            KeyAction::Quit
        }
        KeyCode::Char('r') if key.modifiers.is_empty() => KeyAction::Refresh,
        _ => KeyAction::None,
    }
}
