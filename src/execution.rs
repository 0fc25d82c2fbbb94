//! Lifecycle of a single remote program run
//!
//! `Idle → Running → {Completed | Cancelled}`. Completed and Cancelled are
//! resting states: the next `run` starts from them exactly as from Idle.
//! Only one run is ever live, and each run gets its own cancellation token.

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::parser::{ParseError, Program, ProgramParser};
use crate::remote::{InterpKind, InterpResponse, RemoteError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// Identifies one run so late completions can be matched or discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(u64);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunError {
    #[error("A program is already running.")]
    AlreadyRunning,
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Everything needed to issue the execution request
#[derive(Debug, Clone)]
pub struct RunTicket {
    pub run: RunId,
    pub program: Program,
    pub cancel: CancellationToken,
}

/// How a run ended, as seen by whoever renders it
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Interpreter answered; `error` is set for interpreter-level failures
    Finished { output: String, error: bool },
    /// Request never produced an interpreter verdict
    Failed(RemoteError),
}

#[derive(Debug)]
pub struct ExecutionController {
    status: RunStatus,
    current: Option<(RunId, CancellationToken)>,
    next_id: u64,
}

impl Default for ExecutionController {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionController {
    pub fn new() -> Self {
        Self {
            status: RunStatus::Idle,
            current: None,
            next_id: 0,
        }
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }

    /// Parse `code` and enter Running.
    ///
    /// A parse failure never reaches the server and leaves the controller Idle.
    pub fn run(&mut self, code: &str, parser: &dyn ProgramParser) -> Result<RunTicket, RunError> {
        if self.is_running() {
            return Err(RunError::AlreadyRunning);
        }

        let program = match parser.parse(code) {
            Ok(program) => program,
            Err(e) => {
                self.status = RunStatus::Idle;
                self.current = None;
                return Err(e.into());
            }
        };

        self.next_id += 1;
        let run = RunId(self.next_id);
        let cancel = CancellationToken::new();
        self.current = Some((run, cancel.clone()));
        self.status = RunStatus::Running;
        tracing::debug!(run = run.0, "Run started");

        Ok(RunTicket {
            run,
            program,
            cancel,
        })
    }

    /// Abort the live run. Resolves it as Cancelled right away; whatever the
    /// server eventually answers is discarded. No-op unless Running.
    pub fn stop(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        if let Some((run, cancel)) = &self.current {
            cancel.cancel();
            tracing::debug!(run = run.0, "Run aborted");
        }
        self.status = RunStatus::Cancelled;
        true
    }

    /// Apply the result of the execution request for `run`.
    ///
    /// Returns `None` when the completion belongs to a run that was stopped
    /// or superseded; such results never touch state.
    pub fn complete(
        &mut self,
        run: RunId,
        result: Result<InterpResponse, RemoteError>,
    ) -> Option<RunOutcome> {
        let is_live = matches!(&self.current, Some((live, _)) if *live == run);
        if !is_live || !self.is_running() {
            tracing::debug!(run = run.0, "Ignoring completion of inactive run");
            return None;
        }
        self.current = None;

        match result {
            Ok(response) => {
                self.status = RunStatus::Completed;
                Some(RunOutcome::Finished {
                    output: response.output_text(),
                    error: response.kind == InterpKind::Error,
                })
            }
            Err(e @ RemoteError::Cancelled(_)) => {
                self.status = RunStatus::Cancelled;
                Some(RunOutcome::Failed(e))
            }
            Err(e) => {
                self.status = RunStatus::Idle;
                Some(RunOutcome::Failed(e))
            }
        }
    }

    /// Drop any live run (logout, expiry)
    pub fn reset(&mut self) {
        if let Some((_, cancel)) = self.current.take() {
            cancel.cancel();
        }
        self.status = RunStatus::Idle;
    }
}
