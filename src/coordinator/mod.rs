//! Intent arbitration for the editor
//!
//! The coordinator owns every piece of client state and never performs I/O.
//! Intents are validated synchronously and either rejected with a
//! [`CoordinatorError`] or turned into [`Dispatch`]es for the runtime driver.
//! When a dispatched call finishes, the driver feeds a [`Completion`] back
//! through [`Coordinator::apply`], which may in turn return follow-up calls.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::auth::{AuthStore, Token};
use crate::execution::{ExecutionController, RunError, RunId, RunOutcome};
use crate::export;
use crate::parser::{Program, ProgramParser};
use crate::remote::{FileId, FileRecord, FileSummary, InterpResponse, RemoteError};
use crate::session::files::FileListCache;
use crate::session::naming::{validate_title, TitleError};
use crate::session::{
    FileSession, Mode, OpenDecision, OpenTicket, Resolution, SaveTicket, SessionError,
    UnsavedChoice,
};

pub const STATUS_STARTING: &str = "Starting program...";
pub const STATUS_ERROR: &str = "Program error.";
pub const STATUS_SUCCESS: &str = "Program terminated successfully.";
pub const STATUS_ABORTED: &str = "Program aborted.";

/// Output pane state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Console {
    pub output: String,
    pub status: String,
    /// Last run ended in an error
    pub error: bool,
}

impl Console {
    fn clear(&mut self) {
        self.output.clear();
        self.status.clear();
        self.error = false;
    }
}

/// Remote operation a failure notice refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Run,
    Create,
    List,
    Open,
    Save,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Action::Run => "Run",
            Action::Create => "Create file",
            Action::List => "Loading files",
            Action::Open => "Open file",
            Action::Save => "Save",
            Action::Delete => "Delete",
        };
        f.write_str(label)
    }
}

/// Transient messages for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Raised once per expired session
    SessionExpired,
    RequestFailed { action: Action, message: String },
    Saved(String),
    Created(String),
    Deleted(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::SessionExpired => f.write_str("Access expired. Please log in again."),
            Notice::RequestFailed { action, message } => write!(f, "{} failed: {}", action, message),
            Notice::Saved(title) => write!(f, "Saved {}", title),
            Notice::Created(title) => write!(f, "Created {}", title),
            Notice::Deleted(title) => write!(f, "Deleted {}", title),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Title(#[from] TitleError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Run(#[from] RunError),
    #[error("Unknown file {0}.")]
    UnknownFile(FileId),
}

/// A backend call the runtime should perform
#[derive(Debug, Clone)]
pub enum RemoteCall {
    Execute { run: RunId, program: Program },
    CreateFile { title: String },
    ListFiles,
    FetchFile { ticket: OpenTicket },
    /// `then_open` is requested once the save lands, unless superseded
    SaveFile {
        ticket: SaveTicket,
        then_open: Option<OpenTicket>,
    },
    DeleteFile { id: FileId },
}

impl RemoteCall {
    pub fn action(&self) -> Action {
        match self {
            RemoteCall::Execute { .. } => Action::Run,
            RemoteCall::CreateFile { .. } => Action::Create,
            RemoteCall::ListFiles => Action::List,
            RemoteCall::FetchFile { .. } => Action::Open,
            RemoteCall::SaveFile { .. } => Action::Save,
            RemoteCall::DeleteFile { .. } => Action::Delete,
        }
    }
}

/// Successful payload of a [`RemoteCall`]
#[derive(Debug, Clone)]
pub enum Reply {
    Executed(InterpResponse),
    Created(FileRecord),
    Listed(Vec<FileSummary>),
    Fetched(FileRecord),
    Saved,
    Deleted { next: Option<FileId> },
}

#[derive(Debug, Clone)]
pub struct Dispatch {
    /// Auth epoch the call was issued under
    pub epoch: u64,
    pub call: RemoteCall,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub epoch: u64,
    pub call: RemoteCall,
    pub result: Result<Reply, RemoteError>,
}

impl Completion {
    pub fn new(dispatch: Dispatch, result: Result<Reply, RemoteError>) -> Self {
        Self {
            epoch: dispatch.epoch,
            call: dispatch.call,
            result,
        }
    }
}

pub type Dispatches = Result<Vec<Dispatch>, CoordinatorError>;

pub struct Coordinator {
    auth: AuthStore,
    parser: Arc<dyn ProgramParser>,
    session: FileSession,
    files: FileListCache,
    execution: ExecutionController,
    console: Console,
    notices: VecDeque<Notice>,
    session_expired: bool,
    /// Parent of every file-operation token; replaced on login and teardown
    scope: CancellationToken,
}

impl Coordinator {
    pub fn new(auth: AuthStore, parser: Arc<dyn ProgramParser>) -> Self {
        let mode = mode_for(&auth);
        Self {
            auth,
            parser,
            session: FileSession::new(mode),
            files: FileListCache::default(),
            execution: ExecutionController::new(),
            console: Console::default(),
            notices: VecDeque::new(),
            session_expired: false,
            scope: CancellationToken::new(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Observed state
    // ─────────────────────────────────────────────────────────────────────

    #[cfg(test)]
    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    pub fn session(&self) -> &FileSession {
        &self.session
    }

    pub fn files(&self) -> &FileListCache {
        &self.files
    }

    pub fn execution(&self) -> &ExecutionController {
        &self.execution
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.mode() == Mode::Authenticated
    }

    /// The expiry notice has not been acknowledged yet
    pub fn session_expired(&self) -> bool {
        self.session_expired
    }

    /// Change indicator shown next to the file list
    pub fn indicator(&self) -> &'static str {
        if !self.is_authenticated() {
            "Login to create files."
        } else if !self.session.is_loaded() {
            "Create or load file."
        } else if self.session.is_dirty() {
            "Unsaved changes."
        } else {
            "All changes saved."
        }
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle intents
    // ─────────────────────────────────────────────────────────────────────

    /// Initial calls for a restored session
    pub fn startup(&mut self) -> Vec<Dispatch> {
        if self.is_authenticated() {
            vec![self.dispatch(RemoteCall::ListFiles)]
        } else {
            Vec::new()
        }
    }

    pub fn login(&mut self, token: Token) -> Vec<Dispatch> {
        self.auth.login(token);
        self.reset(Mode::Authenticated);
        self.session_expired = false;
        vec![self.dispatch(RemoteCall::ListFiles)]
    }

    pub fn logout(&mut self) {
        tracing::info!("Logging out");
        self.auth.clear();
        self.reset(Mode::Anonymous);
    }

    pub fn acknowledge_expiry(&mut self) {
        self.session_expired = false;
    }

    /// Drop all session state and withdraw outstanding file operations
    fn reset(&mut self, mode: Mode) {
        self.scope.cancel();
        self.scope = CancellationToken::new();
        self.files.clear();
        self.execution.reset();
        self.session.reset(mode);
        self.console.clear();
    }

    /// Single reaction to a rejected token, however many calls report it
    fn expire(&mut self, epoch: u64) {
        if !self.auth.expire(epoch) {
            tracing::debug!(epoch, "Unauthorized response for an already closed session");
            return;
        }
        self.reset(Mode::Anonymous);
        self.session_expired = true;
        self.notices.push_back(Notice::SessionExpired);
    }

    // ─────────────────────────────────────────────────────────────────────
    // File intents
    // ─────────────────────────────────────────────────────────────────────

    pub fn refresh_files(&mut self) -> Dispatches {
        self.require_auth()?;
        Ok(vec![self.dispatch(RemoteCall::ListFiles)])
    }

    pub fn new_file(&mut self, title: &str) -> Dispatches {
        self.require_auth()?;
        let title = validate_title(title, &self.files)?;
        tracing::debug!(%title, "Creating file");
        Ok(vec![self.dispatch(RemoteCall::CreateFile { title })])
    }

    pub fn request_open(&mut self, id: FileId) -> Dispatches {
        match self.session.request_open(id)? {
            OpenDecision::Open(ticket) => Ok(vec![self.fetch(ticket)]),
            OpenDecision::AlreadyOpen | OpenDecision::AwaitingChoice(_) => Ok(Vec::new()),
        }
    }

    pub fn resolve_unsaved(&mut self, choice: UnsavedChoice) -> Dispatches {
        match self.session.resolve(choice)? {
            Resolution::Cancelled => Ok(Vec::new()),
            Resolution::Open(ticket) => Ok(vec![self.fetch(ticket)]),
            Resolution::SaveThenOpen { save, target } => Ok(vec![self.dispatch(
                RemoteCall::SaveFile {
                    ticket: save,
                    then_open: Some(target),
                },
            )]),
        }
    }

    pub fn edit(&mut self, code: impl Into<String>) -> Result<(), CoordinatorError> {
        Ok(self.session.edit(code)?)
    }

    pub fn save(&mut self) -> Dispatches {
        let ticket = self.session.begin_save()?;
        Ok(vec![self.dispatch(RemoteCall::SaveFile {
            ticket,
            then_open: None,
        })])
    }

    pub fn delete(&mut self, id: FileId) -> Dispatches {
        self.require_auth()?;
        if self.files.get(&id).is_none() {
            return Err(CoordinatorError::UnknownFile(id));
        }
        Ok(vec![self.dispatch(RemoteCall::DeleteFile { id })])
    }

    /// Empty the open buffer (caller has already confirmed)
    pub fn clear(&mut self) -> Result<(), CoordinatorError> {
        self.session.clear_code()?;
        self.console.clear();
        Ok(())
    }

    /// Write the open buffer to `<basename>.txt` under `dir`
    pub fn export(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        if !self.session.is_editable() {
            return Err(SessionError::ReadOnly.into());
        }
        export::write_download(dir, self.session.file())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Execution intents
    // ─────────────────────────────────────────────────────────────────────

    pub fn run(&mut self) -> Dispatches {
        if !self.session.is_editable() {
            return Err(SessionError::ReadOnly.into());
        }
        let code = self.session.file().code.clone();
        match self.execution.run(&code, self.parser.as_ref()) {
            Ok(ticket) => {
                self.console.output.clear();
                self.console.error = false;
                self.console.status = STATUS_STARTING.to_string();
                Ok(vec![Dispatch {
                    epoch: self.auth.epoch(),
                    call: RemoteCall::Execute {
                        run: ticket.run,
                        program: ticket.program,
                    },
                    cancel: ticket.cancel,
                }])
            }
            Err(RunError::Parse(e)) => {
                self.console.output = e.to_string();
                self.console.error = true;
                self.console.status = STATUS_ERROR.to_string();
                Err(RunError::Parse(e).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Abort the live run. Returns false when nothing was running.
    pub fn stop(&mut self) -> bool {
        if !self.execution.stop() {
            return false;
        }
        self.console.error = false;
        self.console.status = STATUS_ABORTED.to_string();
        true
    }

    // ─────────────────────────────────────────────────────────────────────
    // Completions
    // ─────────────────────────────────────────────────────────────────────

    pub fn apply(&mut self, completion: Completion) -> Vec<Dispatch> {
        let Completion {
            epoch,
            call,
            result,
        } = completion;

        if let RemoteCall::Execute { run, .. } = call {
            let result = result.and_then(|reply| match reply {
                Reply::Executed(response) => Ok(response),
                other => Err(unexpected(&other)),
            });
            self.finish_run(epoch, run, result);
            return Vec::new();
        }

        if matches!(result, Err(RemoteError::Unauthorized)) {
            if let RemoteCall::FetchFile { ticket } = &call {
                self.session.fail_open(ticket.seq);
            }
            self.expire(epoch);
            return Vec::new();
        }

        if epoch != self.auth.epoch() {
            tracing::debug!(epoch, action = %call.action(), "Ignoring completion from a previous session");
            return Vec::new();
        }

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                self.fail(call, e);
                return Vec::new();
            }
        };

        match (call, reply) {
            (RemoteCall::ListFiles, Reply::Listed(files)) => {
                tracing::debug!(count = files.len(), "File list refreshed");
                self.files.replace(files);
                Vec::new()
            }
            (RemoteCall::CreateFile { .. }, Reply::Created(record)) => self.created(record),
            (RemoteCall::FetchFile { ticket }, Reply::Fetched(record)) => {
                if self.session.finish_open(ticket.seq, record) {
                    self.console.clear();
                } else {
                    tracing::debug!(id = %ticket.id, seq = ticket.seq, "Discarding superseded open");
                }
                Vec::new()
            }
            (RemoteCall::SaveFile { ticket, then_open }, Reply::Saved) => {
                self.session.finish_save(&ticket.id, ticket.revision);
                self.notices.push_back(Notice::Saved(self.title_of(&ticket.id)));
                match then_open {
                    // Edits made while saving still go through the prompt
                    Some(target) if self.session.is_latest_open(&target) => {
                        self.request_open(target.id).unwrap_or_default()
                    }
                    Some(target) => {
                        tracing::debug!(id = %target.id, "Dropping superseded open after save");
                        Vec::new()
                    }
                    None => Vec::new(),
                }
            }
            (RemoteCall::DeleteFile { id }, Reply::Deleted { next }) => self.deleted(id, next),
            (call, reply) => {
                tracing::warn!(action = %call.action(), "Mismatched reply: {:?}", reply);
                Vec::new()
            }
        }
    }

    fn finish_run(&mut self, epoch: u64, run: RunId, result: Result<InterpResponse, RemoteError>) {
        let Some(outcome) = self.execution.complete(run, result) else {
            return;
        };
        match outcome {
            RunOutcome::Finished { output, error } => {
                self.console.output = output;
                self.console.error = error;
                self.console.status = if error { STATUS_ERROR } else { STATUS_SUCCESS }.to_string();
            }
            RunOutcome::Failed(RemoteError::Cancelled(_)) => {
                self.console.error = false;
                self.console.status = STATUS_ABORTED.to_string();
            }
            RunOutcome::Failed(RemoteError::Unauthorized) => {
                self.console.status.clear();
                self.expire(epoch);
            }
            RunOutcome::Failed(e) => {
                self.console.status.clear();
                self.notices.push_back(Notice::RequestFailed {
                    action: Action::Run,
                    message: e.to_string(),
                });
            }
        }
    }

    fn created(&mut self, record: FileRecord) -> Vec<Dispatch> {
        self.files.insert(record.summary());
        self.notices.push_back(Notice::Created(record.title.clone()));

        if self.session.is_loaded() && self.session.is_dirty() {
            // Switching away from unsaved edits needs the user's choice
            return self.request_open(record.id).unwrap_or_default();
        }
        self.session.install_created(record);
        self.console.clear();
        Vec::new()
    }

    fn deleted(&mut self, id: FileId, next: Option<FileId>) -> Vec<Dispatch> {
        let title = self.title_of(&id);
        self.files.remove(&id);
        self.session.forget_target(&id);
        self.notices.push_back(Notice::Deleted(title));

        if self.session.current_id() != Some(&id) {
            return Vec::new();
        }
        match next.filter(|next| next != &id) {
            Some(next) => {
                // The deleted file is gone even if the replacement fails to load
                self.session.close();
                self.console.clear();
                let ticket = self.session.begin_open(next);
                vec![self.fetch(ticket)]
            }
            None => {
                self.session.close();
                self.console.clear();
                Vec::new()
            }
        }
    }

    fn fail(&mut self, call: RemoteCall, error: RemoteError) {
        if let RemoteCall::FetchFile { ticket } = &call {
            if !self.session.fail_open(ticket.seq) {
                return;
            }
        }
        if error.is_cancelled() {
            return;
        }
        self.notices.push_back(Notice::RequestFailed {
            action: call.action(),
            message: error.to_string(),
        });
    }

    // ─────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────

    fn require_auth(&self) -> Result<(), SessionError> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(SessionError::NotAuthenticated)
        }
    }

    fn dispatch(&self, call: RemoteCall) -> Dispatch {
        Dispatch {
            epoch: self.auth.epoch(),
            call,
            cancel: self.scope.child_token(),
        }
    }

    fn fetch(&self, ticket: OpenTicket) -> Dispatch {
        self.dispatch(RemoteCall::FetchFile { ticket })
    }

    fn title_of(&self, id: &FileId) -> String {
        self.files
            .get(id)
            .map(|f| f.title.clone())
            .or_else(|| {
                (self.session.current_id() == Some(id)).then(|| self.session.file().title.clone())
            })
            .unwrap_or_else(|| id.to_string())
    }
}

fn mode_for(auth: &AuthStore) -> Mode {
    if auth.is_authenticated() {
        Mode::Authenticated
    } else {
        Mode::Anonymous
    }
}

fn unexpected(reply: &Reply) -> RemoteError {
    RemoteError::Other(format!("unexpected reply: {:?}", reply))
}

#[cfg(test)]
mod tests;
