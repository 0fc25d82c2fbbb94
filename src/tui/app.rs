// Application state for the TUI
//
// App owns the coordinator and the driver that performs its calls. Every
// user intent goes through the coordinator; App only turns the results into
// spawned requests, toasts and modals, and keeps the editor buffer in step
// with the session.

use std::path::PathBuf;

use crate::auth::Token;
use crate::config::Config;
use crate::coordinator::{Completion, Coordinator, CoordinatorError, Dispatches, Notice};
use crate::execution::{RunError, RunStatus};
use crate::logging::LogBuffer;
use crate::remote::FileId;
use crate::session::UnsavedChoice;

use super::clipboard;
use super::components::Toast;
use super::editor::EditorBuffer;
use super::modal::Modal;
use super::theme::Theme;
use crate::runtime::Driver;

/// Which pane receives plain keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Files,
    Editor,
}

impl Focus {
    pub fn toggle(self) -> Self {
        match self {
            Focus::Files => Focus::Editor,
            Focus::Editor => Focus::Files,
        }
    }
}

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

pub struct App {
    pub coordinator: Coordinator,
    driver: Driver,
    pub editor: EditorBuffer,
    pub focus: Focus,
    /// Highlighted row in the file list
    pub selected: usize,
    pub modal: Option<Modal>,
    pub toast: Option<Toast>,
    pub theme: Theme,
    pub log_buffer: LogBuffer,
    pub api_url: String,
    download_dir: PathBuf,
    pub should_quit: bool,
    frame: usize,
}

impl App {
    pub fn new(
        coordinator: Coordinator,
        driver: Driver,
        log_buffer: LogBuffer,
        config: &Config,
    ) -> Self {
        let mut app = Self {
            coordinator,
            driver,
            editor: EditorBuffer::default(),
            focus: Focus::Editor,
            selected: 0,
            modal: None,
            toast: None,
            theme: Theme::from_mode(config.theme),
            log_buffer,
            api_url: config.api_url.clone(),
            download_dir: config.download_dir.clone(),
            should_quit: false,
            frame: 0,
        };
        app.sync();
        app
    }

    /// Kick off the calls a restored session needs
    pub fn start(&mut self) {
        let initial = self.coordinator.startup();
        self.driver.spawn_all(initial);
    }

    pub fn tick(&mut self) {
        self.frame = self.frame.wrapping_add(1);
        if self.toast.as_ref().is_some_and(Toast::is_expired) {
            self.toast = None;
        }
    }

    pub fn spinner_char(&self) -> char {
        SPINNER[self.frame % SPINNER.len()]
    }

    pub fn is_running(&self) -> bool {
        self.coordinator.execution().status() == RunStatus::Running
    }

    // ─────────────────────────────────────────────────────────────────────
    // Plumbing
    // ─────────────────────────────────────────────────────────────────────

    /// Feed a finished request back to the coordinator
    pub fn apply(&mut self, completion: Completion) {
        let follow_up = self.coordinator.apply(completion);
        self.driver.spawn_all(follow_up);
        self.sync();
    }

    /// Spawn the calls of an accepted intent, or show why it was refused
    fn dispatch(&mut self, result: Dispatches) {
        match result {
            Ok(dispatches) => self.driver.spawn_all(dispatches),
            Err(e) => self.refuse(e),
        }
        self.sync();
    }

    fn refuse(&mut self, error: CoordinatorError) {
        tracing::debug!(%error, "Intent refused");
        self.toast = Some(Toast::error(error.to_string()));
    }

    /// Bring the view in line with the coordinator after every change
    fn sync(&mut self) {
        for notice in self.coordinator.take_notices() {
            match notice {
                Notice::SessionExpired => self.modal = Some(Modal::SessionExpired),
                Notice::RequestFailed { .. } => {
                    self.toast = Some(Toast::error(notice.to_string()))
                }
                Notice::Saved(_) | Notice::Created(_) | Notice::Deleted(_) => {
                    self.toast = Some(Toast::info(notice.to_string()))
                }
            }
        }

        let session = self.coordinator.session();
        if self.editor.sync(session.generation(), &session.file().code) {
            if let Some(idx) = session
                .current_id()
                .and_then(|id| self.coordinator.files().position(id))
            {
                self.selected = idx;
            }
        }

        let pending = self.coordinator.session().pending_target().cloned();
        let showing = matches!(self.modal, Some(Modal::UnsavedChoice { .. }));
        let blocked = self.modal.as_ref().is_some_and(Modal::is_blocking);
        match pending {
            Some(id) if !blocked => {
                let title = self.title_of(&id);
                self.modal = Some(Modal::UnsavedChoice { title });
            }
            None if showing => self.modal = None,
            _ => {}
        }

        let count = self.coordinator.files().len();
        if count == 0 {
            self.selected = 0;
        } else if self.selected >= count {
            self.selected = count - 1;
        }
    }

    fn title_of(&self, id: &FileId) -> String {
        self.coordinator
            .files()
            .get(id)
            .map(|f| f.title.clone())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn selected_id(&self) -> Option<FileId> {
        self.coordinator
            .files()
            .iter()
            .nth(self.selected)
            .map(|f| f.id.clone())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Intents
    // ─────────────────────────────────────────────────────────────────────

    pub fn run(&mut self) {
        match self.coordinator.run() {
            // Already shown in the output pane
            Err(CoordinatorError::Run(RunError::Parse(_))) => self.sync(),
            result => self.dispatch(result),
        }
    }

    pub fn stop(&mut self) {
        if !self.coordinator.stop() {
            self.toast = Some(Toast::info("Nothing is running."));
        }
    }

    pub fn save(&mut self) {
        let result = self.coordinator.save();
        self.dispatch(result);
    }

    pub fn refresh_files(&mut self) {
        let result = self.coordinator.refresh_files();
        self.dispatch(result);
    }

    pub fn prompt_new_file(&mut self) {
        if !self.coordinator.is_authenticated() {
            self.toast = Some(Toast::error(self.coordinator.indicator()));
            return;
        }
        self.modal = Some(Modal::new_file());
    }

    /// Submit the name prompt; a rejected name keeps the prompt open
    pub fn create_file(&mut self, title: &str) {
        match self.coordinator.new_file(title) {
            Ok(dispatches) => {
                self.modal = None;
                self.driver.spawn_all(dispatches);
            }
            Err(CoordinatorError::Title(reason)) => {
                if let Some(Modal::NewFile { error, .. }) = &mut self.modal {
                    *error = Some(reason.to_string());
                }
            }
            Err(e) => {
                self.modal = None;
                self.refuse(e);
            }
        }
        self.sync();
    }

    pub fn open_selected(&mut self) {
        if let Some(id) = self.selected_id() {
            let result = self.coordinator.request_open(id);
            self.dispatch(result);
        }
    }

    pub fn resolve_unsaved(&mut self, choice: UnsavedChoice) {
        self.modal = None;
        let result = self.coordinator.resolve_unsaved(choice);
        self.dispatch(result);
    }

    pub fn prompt_delete(&mut self) {
        if let Some(id) = self.selected_id() {
            let title = self.title_of(&id);
            self.modal = Some(Modal::ConfirmDelete { id, title });
        }
    }

    pub fn delete(&mut self, id: FileId) {
        self.modal = None;
        let result = self.coordinator.delete(id);
        self.dispatch(result);
    }

    pub fn prompt_clear(&mut self) {
        if !self.coordinator.session().is_editable() {
            self.toast = Some(Toast::error(self.coordinator.indicator()));
            return;
        }
        self.modal = Some(Modal::ConfirmClear);
    }

    pub fn clear(&mut self) {
        self.modal = None;
        if let Err(e) = self.coordinator.clear() {
            self.refuse(e);
        }
        self.sync();
    }

    pub fn download(&mut self) {
        match self.coordinator.export(&self.download_dir) {
            Ok(path) => self.toast = Some(Toast::info(format!("Downloaded {}", path.display()))),
            Err(e) => self.toast = Some(Toast::error(format!("{:#}", e))),
        }
    }

    pub fn copy_output(&mut self) {
        match clipboard::copy_output(&self.coordinator.console().output) {
            Ok(lines) => self.toast = Some(Toast::info(format!("Copied {} lines", lines))),
            Err(e) => self.toast = Some(Toast::error(format!("{:#}", e))),
        }
    }

    pub fn login(&mut self, token: &str) {
        self.modal = None;
        let dispatches = self.coordinator.login(Token::new(token));
        self.driver.spawn_all(dispatches);
        self.sync();
        self.toast = Some(Toast::info("Logged in."));
    }

    pub fn logout(&mut self) {
        if !self.coordinator.is_authenticated() {
            self.toast = Some(Toast::info("Not logged in."));
            return;
        }
        self.coordinator.logout();
        self.sync();
        self.toast = Some(Toast::info("Logged out."));
    }

    /// Dismiss the expiry notice and go straight to the token prompt
    pub fn acknowledge_expiry(&mut self) {
        self.coordinator.acknowledge_expiry();
        self.modal = Some(Modal::login());
    }

    /// Push the editor's text into the session
    pub fn commit_edit(&mut self) {
        if let Err(e) = self.coordinator.edit(self.editor.text()) {
            self.refuse(e);
        }
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.coordinator.files().len() {
            self.selected += 1;
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }
}
