// Modal system for TUI overlays
//
// Self-contained modal dialogs that handle their own input and return actions.
// App just holds Option<Modal>, input routing acts on returned ModalAction.

use crate::remote::FileId;
use crate::session::UnsavedChoice;
use crossterm::event::KeyCode;

/// Actions returned by modal input handling
#[derive(Debug, Clone, PartialEq)]
pub enum ModalAction {
    /// Input consumed, no state change needed
    None,
    /// Close the modal
    Close,
    /// Create a file with the typed name
    Create(String),
    /// Start a session with the typed token
    Login(String),
    /// Answer to the unsaved-changes prompt
    Resolve(UnsavedChoice),
    ClearConfirmed,
    DeleteConfirmed(FileId),
    /// Expiry notice dismissed; offer to log in again
    Acknowledge,
}

/// Available modal types
#[derive(Debug, Clone, PartialEq)]
pub enum Modal {
    /// File name prompt; `error` is the last rejection reason
    NewFile { input: String, error: Option<String> },
    /// Access token prompt
    Login { input: String },
    /// The open file has unsaved changes and another file was requested
    UnsavedChoice { title: String },
    ConfirmClear,
    ConfirmDelete { id: FileId, title: String },
    SessionExpired,
    /// Help overlay - shows keyboard shortcuts
    Help,
    /// Recent log entries
    Logs,
}

impl Modal {
    pub fn new_file() -> Self {
        Modal::NewFile {
            input: String::new(),
            error: None,
        }
    }

    pub fn login() -> Self {
        Modal::Login {
            input: String::new(),
        }
    }

    /// Modals the user must answer before anything else happens
    pub fn is_blocking(&self) -> bool {
        matches!(self, Modal::UnsavedChoice { .. } | Modal::SessionExpired)
    }

    /// Handle keyboard input, return action for caller to execute
    pub fn handle_input(&mut self, key: KeyCode) -> ModalAction {
        match self {
            Modal::NewFile { input, error } => match key {
                KeyCode::Esc => ModalAction::Close,
                KeyCode::Enter => ModalAction::Create(input.clone()),
                KeyCode::Backspace => {
                    input.pop();
                    *error = None;
                    ModalAction::None
                }
                KeyCode::Char(c) => {
                    input.push(c);
                    *error = None;
                    ModalAction::None
                }
                _ => ModalAction::None,
            },
            Modal::Login { input } => match key {
                KeyCode::Esc => ModalAction::Close,
                KeyCode::Enter if !input.trim().is_empty() => {
                    ModalAction::Login(input.trim().to_string())
                }
                KeyCode::Backspace => {
                    input.pop();
                    ModalAction::None
                }
                KeyCode::Char(c) => {
                    input.push(c);
                    ModalAction::None
                }
                _ => ModalAction::None,
            },
            Modal::UnsavedChoice { .. } => match key {
                KeyCode::Char('s') | KeyCode::Char('S') | KeyCode::Enter => {
                    ModalAction::Resolve(UnsavedChoice::SaveThenOpen)
                }
                KeyCode::Char('d') | KeyCode::Char('D') => {
                    ModalAction::Resolve(UnsavedChoice::DiscardAndOpen)
                }
                KeyCode::Char('c') | KeyCode::Char('C') | KeyCode::Esc => {
                    ModalAction::Resolve(UnsavedChoice::Cancel)
                }
                _ => ModalAction::None,
            },
            Modal::ConfirmClear => match key {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    ModalAction::ClearConfirmed
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => ModalAction::Close,
                _ => ModalAction::None,
            },
            Modal::ConfirmDelete { id, .. } => match key {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    ModalAction::DeleteConfirmed(id.clone())
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => ModalAction::Close,
                _ => ModalAction::None,
            },
            Modal::SessionExpired => match key {
                KeyCode::Enter | KeyCode::Esc => ModalAction::Acknowledge,
                _ => ModalAction::None,
            },
            Modal::Help => match key {
                KeyCode::Esc | KeyCode::F(1) | KeyCode::Char('q') => ModalAction::Close,
                _ => ModalAction::None,
            },
            Modal::Logs => match key {
                KeyCode::Esc | KeyCode::F(2) | KeyCode::Char('q') => ModalAction::Close,
                _ => ModalAction::None,
            },
        }
    }
}
