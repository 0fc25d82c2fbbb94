//! Coordinator transition tests
//!
//! Completions are fed back by hand, so every interleaving here is exact.

use super::*;
use crate::execution::RunStatus;
use crate::parser::SourceParser;
use crate::remote::{CancelStage, InterpKind};
use crate::session::UNTITLED;

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn coordinator(token: Option<&str>) -> Coordinator {
    let auth = AuthStore::in_memory(token.map(Token::new));
    Coordinator::new(auth, Arc::new(SourceParser))
}

fn single(dispatches: Vec<Dispatch>) -> Dispatch {
    assert_eq!(dispatches.len(), 1, "expected one dispatch: {:?}", dispatches);
    dispatches.into_iter().next().unwrap()
}

fn reply(c: &mut Coordinator, dispatch: Dispatch, result: Result<Reply, RemoteError>) -> Vec<Dispatch> {
    c.apply(Completion::new(dispatch, result))
}

fn record(id: i64, title: &str, code: &str) -> FileRecord {
    FileRecord {
        id: FileId::from(id),
        title: title.to_string(),
        code: code.to_string(),
    }
}

fn executed(kind: InterpKind, output: &str) -> Reply {
    Reply::Executed(InterpResponse {
        kind,
        output: serde_json::Value::String(output.to_string()),
        access_token: None,
    })
}

/// Logged in with files 1..=n listed
fn logged_in(n: i64) -> Coordinator {
    let mut c = coordinator(Some("token"));
    let list = single(c.startup());
    let files = (1..=n)
        .map(|i| record(i, &format!("f{}.sc", i), "").summary())
        .collect();
    reply(&mut c, list, Ok(Reply::Listed(files)));
    c
}

fn open(c: &mut Coordinator, id: i64, code: &str) {
    let fetch = single(c.request_open(FileId::from(id)).unwrap());
    let follow = reply(
        c,
        fetch,
        Ok(Reply::Fetched(record(id, &format!("f{}.sc", id), code))),
    );
    assert!(follow.is_empty());
    assert_eq!(c.session().current_id(), Some(&FileId::from(id)));
}

fn is_fetch_of(dispatch: &Dispatch, id: i64) -> bool {
    matches!(&dispatch.call, RemoteCall::FetchFile { ticket } if ticket.id == FileId::from(id))
}

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn anonymous_startup_makes_no_calls() {
    let mut c = coordinator(None);
    assert!(c.startup().is_empty());
    assert_eq!(c.session().file().title, UNTITLED);
    assert_eq!(c.indicator(), "Login to create files.");
}

#[test]
fn restored_session_lists_files() {
    let c = logged_in(2);
    assert_eq!(c.files().len(), 2);
    assert_eq!(c.indicator(), "Create or load file.");
}

#[test]
fn login_starts_fresh_session_and_lists_files() {
    let mut c = coordinator(None);
    c.edit("scratch").unwrap();

    let list = single(c.login(Token::new("fresh")));
    assert!(matches!(list.call, RemoteCall::ListFiles));
    assert!(c.is_authenticated());
    assert!(!c.session().is_editable());
    assert_eq!(c.session().file().code, "");
}

#[test]
fn logout_resets_everything() {
    let mut c = logged_in(2);
    open(&mut c, 1, "code");
    c.edit("changed").unwrap();

    c.logout();

    assert!(c.files().is_empty());
    assert!(!c.auth().is_authenticated());
    assert_eq!(c.session().file().title, UNTITLED);
    assert!(!c.session().is_dirty());
    assert_eq!(c.console(), &Console::default());
    assert!(c.take_notices().is_empty());
}

#[test]
fn completion_from_before_logout_is_ignored() {
    let mut c = logged_in(0);
    let list = single(c.refresh_files().unwrap());
    assert!(!list.cancel.is_cancelled());

    c.logout();
    assert!(list.cancel.is_cancelled());

    let files = vec![record(9, "late.sc", "").summary()];
    reply(&mut c, list, Ok(Reply::Listed(files)));
    assert!(c.files().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Creating files
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn valid_title_creates_and_opens_clean_file() {
    let mut c = logged_in(1);
    let create = single(c.new_file("  main.sc ").unwrap());
    match &create.call {
        RemoteCall::CreateFile { title } => assert_eq!(title, "main.sc"),
        other => panic!("unexpected call {:?}", other),
    }

    let follow = reply(&mut c, create, Ok(Reply::Created(record(5, "main.sc", ""))));

    assert!(follow.is_empty());
    assert_eq!(c.session().current_id(), Some(&FileId::from(5)));
    assert!(!c.session().is_dirty());
    assert!(c.files().get(&FileId::from(5)).is_some());
    assert_eq!(c.take_notices(), vec![Notice::Created("main.sc".into())]);
}

#[test]
fn rejected_title_changes_nothing() {
    let mut c = logged_in(1);
    let err = c.new_file("F1.SC").unwrap_err();
    assert_eq!(err, CoordinatorError::Title(TitleError::Duplicate));

    let err = c.new_file("two words.txt").unwrap_err();
    assert_eq!(err, CoordinatorError::Title(TitleError::MissingExtension));

    assert_eq!(c.files().len(), 1);
    assert!(!c.session().is_loaded());
}

#[test]
fn anonymous_cannot_create() {
    let mut c = coordinator(None);
    assert_eq!(
        c.new_file("main.sc").unwrap_err(),
        CoordinatorError::Session(SessionError::NotAuthenticated)
    );
}

#[test]
fn creating_while_dirty_asks_before_switching() {
    let mut c = logged_in(1);
    open(&mut c, 1, "a");
    c.edit("edited").unwrap();

    let create = single(c.new_file("next.sc").unwrap());
    let follow = reply(&mut c, create, Ok(Reply::Created(record(2, "next.sc", ""))));

    assert!(follow.is_empty());
    assert_eq!(c.session().current_id(), Some(&FileId::from(1)));
    assert_eq!(c.session().pending_target(), Some(&FileId::from(2)));
    assert_eq!(c.session().file().code, "edited");
    assert!(c.files().get(&FileId::from(2)).is_some());
}

// ─────────────────────────────────────────────────────────────────────────────
// Opening and saving
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn dirty_switch_never_discards_silently() {
    let mut c = logged_in(2);
    open(&mut c, 1, "a");
    c.edit("edited").unwrap();

    assert!(c.request_open(FileId::from(2)).unwrap().is_empty());
    assert_eq!(c.session().pending_target(), Some(&FileId::from(2)));
    assert_eq!(c.session().file().code, "edited");

    let fetch = single(c.resolve_unsaved(UnsavedChoice::DiscardAndOpen).unwrap());
    assert!(is_fetch_of(&fetch, 2));
}

#[test]
fn cancelled_choice_keeps_edits() {
    let mut c = logged_in(2);
    open(&mut c, 1, "a");
    c.edit("edited").unwrap();
    c.request_open(FileId::from(2)).unwrap();

    assert!(c.resolve_unsaved(UnsavedChoice::Cancel).unwrap().is_empty());
    assert!(c.session().is_dirty());
    assert_eq!(c.indicator(), "Unsaved changes.");
}

#[test]
fn save_then_open_waits_for_save() {
    let mut c = logged_in(2);
    open(&mut c, 1, "a");
    c.edit("edited").unwrap();
    c.request_open(FileId::from(2)).unwrap();

    let save = single(c.resolve_unsaved(UnsavedChoice::SaveThenOpen).unwrap());
    match &save.call {
        RemoteCall::SaveFile { ticket, then_open } => {
            assert_eq!(ticket.code, "edited");
            assert_eq!(then_open.as_ref().map(|t| &t.id), Some(&FileId::from(2)));
        }
        other => panic!("unexpected call {:?}", other),
    }

    let fetch = single(reply(&mut c, save, Ok(Reply::Saved)));
    assert!(is_fetch_of(&fetch, 2));
    assert_eq!(c.indicator(), "All changes saved.");

    reply(&mut c, fetch, Ok(Reply::Fetched(record(2, "f2.sc", "two"))));
    assert_eq!(c.session().file().code, "two");
}

#[test]
fn discard_during_save_then_open_keeps_newer_target() {
    let mut c = logged_in(3);
    open(&mut c, 1, "a");
    c.edit("edited").unwrap();
    c.request_open(FileId::from(2)).unwrap();
    let save = single(c.resolve_unsaved(UnsavedChoice::SaveThenOpen).unwrap());

    // Still dirty while the save is in flight, so file 3 prompts again
    assert!(c.request_open(FileId::from(3)).unwrap().is_empty());
    let fetch = single(c.resolve_unsaved(UnsavedChoice::DiscardAndOpen).unwrap());
    assert!(is_fetch_of(&fetch, 3));

    assert!(reply(&mut c, save, Ok(Reply::Saved)).is_empty());
    reply(&mut c, fetch, Ok(Reply::Fetched(record(3, "f3.sc", "three"))));
    assert_eq!(c.session().current_id(), Some(&FileId::from(3)));
    assert_eq!(c.session().file().code, "three");
}

#[test]
fn save_landing_keeps_newer_prompt() {
    let mut c = logged_in(3);
    open(&mut c, 1, "a");
    c.edit("edited").unwrap();
    c.request_open(FileId::from(2)).unwrap();
    let save = single(c.resolve_unsaved(UnsavedChoice::SaveThenOpen).unwrap());
    assert!(c.request_open(FileId::from(3)).unwrap().is_empty());

    assert!(reply(&mut c, save, Ok(Reply::Saved)).is_empty());
    assert_eq!(c.session().pending_target(), Some(&FileId::from(3)));
    assert_eq!(c.session().current_id(), Some(&FileId::from(1)));

    // The save covered the latest edit, so the remaining prompt has nothing to lose
    let fetch = single(c.resolve_unsaved(UnsavedChoice::SaveThenOpen).unwrap());
    assert!(is_fetch_of(&fetch, 3));
}

#[test]
fn failed_save_aborts_the_switch() {
    let mut c = logged_in(2);
    open(&mut c, 1, "a");
    c.edit("edited").unwrap();
    c.request_open(FileId::from(2)).unwrap();

    let save = single(c.resolve_unsaved(UnsavedChoice::SaveThenOpen).unwrap());
    let follow = reply(&mut c, save, Err(RemoteError::Other("disk full".into())));

    assert!(follow.is_empty());
    assert_eq!(c.session().current_id(), Some(&FileId::from(1)));
    assert!(c.session().is_dirty());
    assert_eq!(
        c.take_notices(),
        vec![Notice::RequestFailed {
            action: Action::Save,
            message: "disk full".into()
        }]
    );
}

#[test]
fn rapid_switching_keeps_latest_target() {
    let mut c = logged_in(3);
    let first = single(c.request_open(FileId::from(2)).unwrap());
    let second = single(c.request_open(FileId::from(3)).unwrap());

    reply(&mut c, second, Ok(Reply::Fetched(record(3, "f3.sc", "three"))));
    reply(&mut c, first, Ok(Reply::Fetched(record(2, "f2.sc", "two"))));

    assert_eq!(c.session().current_id(), Some(&FileId::from(3)));
    assert_eq!(c.session().file().code, "three");
}

#[test]
fn save_clears_dirty_and_reopen_keeps_saved_code() {
    let mut c = logged_in(1);
    open(&mut c, 1, "a");
    c.edit("saved code").unwrap();

    let save = single(c.save().unwrap());
    reply(&mut c, save, Ok(Reply::Saved));
    assert!(!c.session().is_dirty());
    assert_eq!(c.take_notices(), vec![Notice::Saved("f1.sc".into())]);

    assert!(c.request_open(FileId::from(1)).unwrap().is_empty());
    assert_eq!(c.session().file().code, "saved code");
}

#[test]
fn edits_during_save_stay_dirty() {
    let mut c = logged_in(1);
    open(&mut c, 1, "a");
    c.edit("one").unwrap();
    let save = single(c.save().unwrap());
    c.edit("two").unwrap();

    reply(&mut c, save, Ok(Reply::Saved));
    assert!(c.session().is_dirty());
}

#[test]
fn save_requires_changes() {
    let mut c = logged_in(1);
    assert_eq!(
        c.save().unwrap_err(),
        CoordinatorError::Session(SessionError::NoFileLoaded)
    );
    open(&mut c, 1, "a");
    assert_eq!(
        c.save().unwrap_err(),
        CoordinatorError::Session(SessionError::NothingToSave)
    );
}

#[test]
fn failed_open_surfaces_notice() {
    let mut c = logged_in(2);
    let fetch = single(c.request_open(FileId::from(2)).unwrap());
    reply(&mut c, fetch, Err(RemoteError::Other("boom".into())));

    assert!(c.session().opening().is_none());
    assert_eq!(c.take_notices().len(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Delete and clear
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn deleting_open_file_opens_replacement() {
    let mut c = logged_in(2);
    open(&mut c, 1, "a");

    let delete = single(c.delete(FileId::from(1)).unwrap());
    let fetch = single(reply(
        &mut c,
        delete,
        Ok(Reply::Deleted {
            next: Some(FileId::from(2)),
        }),
    ));
    assert!(c.files().get(&FileId::from(1)).is_none());
    assert!(is_fetch_of(&fetch, 2));

    reply(&mut c, fetch, Ok(Reply::Fetched(record(2, "f2.sc", "two"))));
    assert_eq!(c.session().current_id(), Some(&FileId::from(2)));
    assert!(!c.session().is_dirty());
}

#[test]
fn failed_replacement_leaves_no_file_open() {
    let mut c = logged_in(2);
    open(&mut c, 1, "a");

    let delete = single(c.delete(FileId::from(1)).unwrap());
    let fetch = single(reply(
        &mut c,
        delete,
        Ok(Reply::Deleted {
            next: Some(FileId::from(2)),
        }),
    ));
    reply(&mut c, fetch, Err(RemoteError::Other("gone".into())));

    assert!(!c.session().is_loaded());
    assert_eq!(c.session().current_id(), None);
    assert!(c.save().is_err());
    assert_eq!(
        c.take_notices(),
        vec![
            Notice::Deleted("f1.sc".into()),
            Notice::RequestFailed {
                action: Action::Open,
                message: "gone".into()
            }
        ]
    );
}

#[test]
fn deleting_open_file_without_replacement_empties_session() {
    let mut c = logged_in(1);
    open(&mut c, 1, "a");
    let run = single(c.run().unwrap());
    reply(&mut c, run, Ok(executed(InterpKind::Ok, "out")));
    assert!(!c.console().output.is_empty());

    let delete = single(c.delete(FileId::from(1)).unwrap());
    assert!(reply(&mut c, delete, Ok(Reply::Deleted { next: None })).is_empty());

    assert!(!c.session().is_loaded());
    assert!(c.files().is_empty());
    assert_eq!(c.console(), &Console::default());
    assert_eq!(c.take_notices(), vec![Notice::Deleted("f1.sc".into())]);
}

#[test]
fn deleting_other_file_keeps_session() {
    let mut c = logged_in(2);
    open(&mut c, 1, "a");
    let delete = single(c.delete(FileId::from(2)).unwrap());
    assert!(reply(
        &mut c,
        delete,
        Ok(Reply::Deleted {
            next: Some(FileId::from(1))
        })
    )
    .is_empty());
    assert_eq!(c.session().current_id(), Some(&FileId::from(1)));
    assert_eq!(c.files().len(), 1);
}

#[test]
fn deleting_unknown_file_is_rejected() {
    let mut c = logged_in(1);
    assert_eq!(
        c.delete(FileId::from(7)).unwrap_err(),
        CoordinatorError::UnknownFile(FileId::from(7))
    );
}

#[test]
fn clear_empties_buffer_and_console() {
    let mut c = logged_in(1);
    open(&mut c, 1, "code");
    c.clear().unwrap();
    assert_eq!(c.session().file().code, "");
    assert!(c.session().is_dirty());
    assert_eq!(c.session().current_id(), Some(&FileId::from(1)));
}

// ─────────────────────────────────────────────────────────────────────────────
// Execution
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn anonymous_run_reports_success() {
    let mut c = coordinator(None);
    c.edit("print(1)").unwrap();

    let run = single(c.run().unwrap());
    assert_eq!(c.console().status, STATUS_STARTING);

    reply(&mut c, run, Ok(executed(InterpKind::Ok, "1")));
    assert_eq!(c.console().output, "1");
    assert_eq!(c.console().status, STATUS_SUCCESS);
    assert!(!c.console().error);
}

#[test]
fn interpreter_error_is_flagged() {
    let mut c = coordinator(None);
    c.edit("oops").unwrap();
    let run = single(c.run().unwrap());
    reply(&mut c, run, Ok(executed(InterpKind::Error, "bad")));
    assert_eq!(c.console().status, STATUS_ERROR);
    assert!(c.console().error);
    assert_eq!(c.execution().status(), RunStatus::Completed);
}

#[test]
fn parse_error_never_dispatches() {
    let mut c = coordinator(None);
    c.edit("print((").unwrap();
    let err = c.run().unwrap_err();
    assert!(matches!(err, CoordinatorError::Run(RunError::Parse(_))));
    assert_eq!(c.execution().status(), RunStatus::Idle);
    assert_eq!(c.console().status, STATUS_ERROR);
    assert!(c.console().output.contains("unclosed"));
}

#[test]
fn second_run_is_refused() {
    let mut c = coordinator(None);
    c.edit("a").unwrap();
    single(c.run().unwrap());
    assert_eq!(
        c.run().unwrap_err(),
        CoordinatorError::Run(RunError::AlreadyRunning)
    );
}

#[test]
fn authenticated_without_file_cannot_run_or_edit() {
    let mut c = logged_in(1);
    assert_eq!(
        c.run().unwrap_err(),
        CoordinatorError::Session(SessionError::ReadOnly)
    );
    assert_eq!(
        c.edit("x").unwrap_err(),
        CoordinatorError::Session(SessionError::ReadOnly)
    );
}

#[test]
fn stop_aborts_even_if_server_succeeds() {
    let mut c = coordinator(None);
    c.edit("a").unwrap();
    let run = single(c.run().unwrap());

    assert!(c.stop());
    assert!(run.cancel.is_cancelled());
    assert_eq!(c.console().status, STATUS_ABORTED);

    reply(&mut c, run, Ok(executed(InterpKind::Ok, "late")));
    assert_eq!(c.console().status, STATUS_ABORTED);
    assert_eq!(c.console().output, "");
    assert_eq!(c.execution().status(), RunStatus::Cancelled);
    assert!(!c.stop());
}

#[test]
fn cancelled_completion_reads_as_aborted() {
    let mut c = coordinator(None);
    c.edit("a").unwrap();
    let run = single(c.run().unwrap());
    reply(&mut c, run, Err(RemoteError::Cancelled(CancelStage::InFlight)));
    assert_eq!(c.console().status, STATUS_ABORTED);
    assert!(c.take_notices().is_empty());
}

#[test]
fn run_transport_failure_is_surfaced() {
    let mut c = coordinator(None);
    c.edit("a").unwrap();
    let run = single(c.run().unwrap());
    reply(&mut c, run, Err(RemoteError::Other("offline".into())));
    assert_eq!(c.execution().status(), RunStatus::Idle);
    assert_eq!(
        c.take_notices(),
        vec![Notice::RequestFailed {
            action: Action::Run,
            message: "offline".into()
        }]
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Expiry
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn concurrent_401s_expire_once() {
    let mut c = logged_in(2);
    open(&mut c, 1, "a");
    let fetch = single(c.request_open(FileId::from(2)).unwrap());
    let list = single(c.refresh_files().unwrap());

    reply(&mut c, fetch, Err(RemoteError::Unauthorized));
    reply(&mut c, list, Err(RemoteError::Unauthorized));

    assert_eq!(c.take_notices(), vec![Notice::SessionExpired]);
    assert!(c.session_expired());
    assert!(c.files().is_empty());
    assert!(!c.auth().is_authenticated());
    assert_eq!(c.session().file().title, UNTITLED);

    c.acknowledge_expiry();
    assert!(!c.session_expired());
}

#[test]
fn unauthorized_run_expires_session() {
    let mut c = logged_in(1);
    open(&mut c, 1, "print(1)");
    let run = single(c.run().unwrap());

    reply(&mut c, run, Err(RemoteError::Unauthorized));

    assert_eq!(c.execution().status(), RunStatus::Idle);
    assert!(!c.is_authenticated());
    assert_eq!(c.take_notices(), vec![Notice::SessionExpired]);
}

#[test]
fn late_401_after_relogin_is_ignored() {
    let mut c = logged_in(1);
    let old = single(c.refresh_files().unwrap());
    single(c.login(Token::new("second")));

    reply(&mut c, old, Err(RemoteError::Unauthorized));
    assert!(c.is_authenticated());
    assert!(c.take_notices().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Export
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn export_writes_buffer() {
    let dir = tempfile::tempdir().unwrap();
    let mut c = coordinator(None);
    c.edit("print(1)").unwrap();

    let path = c.export(dir.path()).unwrap();
    assert_eq!(path, dir.path().join("untitled.txt"));
    assert_eq!(std::fs::read_to_string(path).unwrap(), "print(1)");
}

#[test]
fn export_is_disabled_without_open_file() {
    let dir = tempfile::tempdir().unwrap();
    let c = logged_in(1);
    assert!(c.export(dir.path()).is_err());
}
