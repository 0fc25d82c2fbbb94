//! The open file: identity, content, dirty flag and switch arbitration
//!
//! `FileSession` is a plain state machine. It never talks to the network;
//! operations that need the server hand out tickets (`OpenTicket`,
//! `SaveTicket`) and the matching `finish_*` call applies the result. Tickets
//! carry sequence numbers so superseded replies can be recognised and dropped.

pub mod files;
pub mod naming;

use crate::remote::{FileId, FileRecord};
use thiserror::Error;

/// Title of the anonymous scratch buffer
pub const UNTITLED: &str = "untitled.sc";

/// A buffer as the editor sees it. `id == None` means never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub id: Option<FileId>,
    pub title: String,
    pub code: String,
}

impl File {
    fn untitled() -> Self {
        Self {
            id: None,
            title: UNTITLED.to_string(),
            code: String::new(),
        }
    }

    fn blank() -> Self {
        Self {
            id: None,
            title: String::new(),
            code: String::new(),
        }
    }

    /// Title up to the first '.', used for exports
    pub fn basename(&self) -> &str {
        self.title.split('.').next().unwrap_or_default()
    }
}

impl From<FileRecord> for File {
    fn from(record: FileRecord) -> Self {
        Self {
            id: Some(record.id),
            title: record.title,
            code: record.code,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// No token: a single editable, unsaved scratch buffer
    Anonymous,
    Authenticated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No stored file is open. The scratch buffer is editable only when anonymous.
    NoFile { scratch: File, dirty: bool },
    /// A stored file is open
    Loaded { file: File, dirty: bool },
}

/// Answer to the unsaved-changes prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsavedChoice {
    SaveThenOpen,
    DiscardAndOpen,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenTicket {
    pub id: FileId,
    pub seq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTicket {
    pub id: FileId,
    pub code: String,
    /// Edit revision the saved code corresponds to
    pub revision: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenDecision {
    /// The requested file is already the open one
    AlreadyOpen,
    /// Fetch and install the file
    Open(OpenTicket),
    /// The open file has unsaved edits; the caller must ask the user
    AwaitingChoice(FileId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Cancelled,
    Open(OpenTicket),
    /// Persist first, then open `target` once the save lands
    SaveThenOpen { save: SaveTicket, target: OpenTicket },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Login to create files.")]
    NotAuthenticated,
    #[error("Create or load file.")]
    ReadOnly,
    #[error("No file is open.")]
    NoFileLoaded,
    #[error("All changes saved.")]
    NothingToSave,
    #[error("No pending file switch.")]
    NoPendingChoice,
}

#[derive(Debug)]
pub struct FileSession {
    mode: Mode,
    state: SessionState,
    /// Target of the unresolved unsaved-changes prompt
    pending: Option<FileId>,
    /// Latest open request; replies for older sequences are stale
    opening: Option<OpenTicket>,
    /// Bumped by every open request, choice and file replacement
    open_seq: u64,
    /// Bumped on every local edit
    revision: u64,
    /// Bumped whenever the code is replaced from outside the editor
    generation: u64,
}

impl FileSession {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            state: Self::initial_state(mode),
            pending: None,
            opening: None,
            open_seq: 0,
            revision: 0,
            generation: 0,
        }
    }

    fn initial_state(mode: Mode) -> SessionState {
        let scratch = match mode {
            Mode::Anonymous => File::untitled(),
            Mode::Authenticated => File::blank(),
        };
        SessionState::NoFile {
            scratch,
            dirty: false,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn file(&self) -> &File {
        match &self.state {
            SessionState::NoFile { scratch, .. } => scratch,
            SessionState::Loaded { file, .. } => file,
        }
    }

    pub fn current_id(&self) -> Option<&FileId> {
        match &self.state {
            SessionState::Loaded { file, .. } => file.id.as_ref(),
            SessionState::NoFile { .. } => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, SessionState::Loaded { .. })
    }

    pub fn is_dirty(&self) -> bool {
        match self.state {
            SessionState::NoFile { dirty, .. } | SessionState::Loaded { dirty, .. } => dirty,
        }
    }

    /// Authenticated sessions can only edit stored files
    pub fn is_editable(&self) -> bool {
        self.is_loaded() || self.mode == Mode::Anonymous
    }

    pub fn pending_target(&self) -> Option<&FileId> {
        self.pending.as_ref()
    }

    /// Whether nothing has asked for a different file since `ticket` was issued
    pub fn is_latest_open(&self, ticket: &OpenTicket) -> bool {
        ticket.seq == self.open_seq && self.pending.is_none()
    }

    #[cfg(test)]
    pub fn opening(&self) -> Option<&FileId> {
        self.opening.as_ref().map(|t| &t.id)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    // ─────────────────────────────────────────────────────────────────────
    // Editing
    // ─────────────────────────────────────────────────────────────────────

    pub fn edit(&mut self, code: impl Into<String>) -> Result<(), SessionError> {
        if !self.is_editable() {
            return Err(SessionError::ReadOnly);
        }
        let code = code.into();
        match &mut self.state {
            SessionState::Loaded { file, dirty } => {
                file.code = code;
                *dirty = true;
            }
            SessionState::NoFile { scratch, dirty } => {
                // Scratch buffers are dirty relative to empty
                *dirty = !code.is_empty();
                scratch.code = code;
            }
        }
        self.revision += 1;
        Ok(())
    }

    /// Empty the open buffer. Confirmation is the caller's job.
    pub fn clear_code(&mut self) -> Result<(), SessionError> {
        if !self.is_editable() {
            return Err(SessionError::ReadOnly);
        }
        match &mut self.state {
            SessionState::Loaded { file, dirty } => {
                file.code.clear();
                *dirty = true;
            }
            SessionState::NoFile { scratch, dirty } => {
                scratch.code.clear();
                *dirty = false;
            }
        }
        self.revision += 1;
        self.generation += 1;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Opening
    // ─────────────────────────────────────────────────────────────────────

    pub fn request_open(&mut self, id: FileId) -> Result<OpenDecision, SessionError> {
        if self.mode == Mode::Anonymous {
            return Err(SessionError::NotAuthenticated);
        }
        // Supersedes a save-then-open still in flight
        self.open_seq += 1;
        if self.current_id() == Some(&id) {
            return Ok(OpenDecision::AlreadyOpen);
        }
        if self.is_loaded() && self.is_dirty() {
            // A newer request replaces whatever target was waiting
            self.pending = Some(id.clone());
            return Ok(OpenDecision::AwaitingChoice(id));
        }
        Ok(OpenDecision::Open(self.begin_open(id)))
    }

    /// Start fetching `id`, superseding any earlier open
    pub fn begin_open(&mut self, id: FileId) -> OpenTicket {
        self.open_seq += 1;
        self.pending = None;
        let ticket = OpenTicket {
            id,
            seq: self.open_seq,
        };
        self.opening = Some(ticket.clone());
        ticket
    }

    /// Install a fetched file. Returns false when the reply is stale.
    pub fn finish_open(&mut self, seq: u64, record: FileRecord) -> bool {
        match &self.opening {
            Some(ticket) if ticket.seq == seq => {}
            _ => return false,
        }
        self.opening = None;
        self.install(File::from(record));
        true
    }

    /// Forget a failed open. Returns false when the reply is stale.
    pub fn fail_open(&mut self, seq: u64) -> bool {
        match &self.opening {
            Some(ticket) if ticket.seq == seq => {
                self.opening = None;
                true
            }
            _ => false,
        }
    }

    pub fn resolve(&mut self, choice: UnsavedChoice) -> Result<Resolution, SessionError> {
        let target = self.pending.take().ok_or(SessionError::NoPendingChoice)?;
        match choice {
            UnsavedChoice::Cancel => Ok(Resolution::Cancelled),
            UnsavedChoice::DiscardAndOpen => Ok(Resolution::Open(self.begin_open(target))),
            UnsavedChoice::SaveThenOpen => match self.begin_save() {
                Ok(save) => {
                    self.open_seq += 1;
                    let target = OpenTicket {
                        id: target,
                        seq: self.open_seq,
                    };
                    Ok(Resolution::SaveThenOpen { save, target })
                }
                // Nothing left to save: just switch
                Err(_) => Ok(Resolution::Open(self.begin_open(target))),
            },
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Saving
    // ─────────────────────────────────────────────────────────────────────

    pub fn begin_save(&self) -> Result<SaveTicket, SessionError> {
        if self.mode == Mode::Anonymous {
            return Err(SessionError::NotAuthenticated);
        }
        let SessionState::Loaded { file, dirty } = &self.state else {
            return Err(SessionError::NoFileLoaded);
        };
        let Some(id) = file.id.clone() else {
            return Err(SessionError::NoFileLoaded);
        };
        if !dirty {
            return Err(SessionError::NothingToSave);
        }
        Ok(SaveTicket {
            id,
            code: file.code.clone(),
            revision: self.revision,
        })
    }

    /// Mark the file clean if the save covered the latest edit.
    /// Returns whether the file is now clean.
    pub fn finish_save(&mut self, id: &FileId, revision: u64) -> bool {
        let current_revision = self.revision;
        match &mut self.state {
            SessionState::Loaded { file, dirty } if file.id.as_ref() == Some(id) => {
                if revision == current_revision {
                    *dirty = false;
                }
                !*dirty
            }
            _ => false,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Make a freshly created file the open one
    pub fn install_created(&mut self, record: FileRecord) {
        self.open_seq += 1;
        self.opening = None;
        self.pending = None;
        self.install(File::from(record));
    }

    /// Close the open file without a replacement (deleted remotely)
    pub fn close(&mut self) {
        self.open_seq += 1;
        self.opening = None;
        self.pending = None;
        self.state = Self::initial_state(self.mode);
        self.generation += 1;
    }

    /// Drop a pending switch whose target no longer exists
    pub fn forget_target(&mut self, id: &FileId) {
        if self.pending.as_ref() == Some(id) {
            self.pending = None;
        }
        if self.opening.as_ref().map(|t| &t.id) == Some(id) {
            self.opening = None;
        }
    }

    /// Start over in `mode` (login, logout, expiry)
    pub fn reset(&mut self, mode: Mode) {
        self.mode = mode;
        self.open_seq += 1;
        self.opening = None;
        self.pending = None;
        self.state = Self::initial_state(mode);
        self.generation += 1;
    }

    fn install(&mut self, file: File) {
        debug_assert!(file.id.is_some());
        tracing::debug!(title = %file.title, "Opened file");
        self.state = SessionState::Loaded { file, dirty: false };
        self.generation += 1;
    }
}
