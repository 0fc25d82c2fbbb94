//! Executes coordinator dispatches on the tokio runtime
//!
//! Each dispatch runs on its own task and reports back over a bounded mpsc
//! channel, so the coordinator is only ever touched from one place.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::coordinator::{Completion, Coordinator, Dispatch, RemoteCall, Reply};
use crate::remote::{RemoteClient, RemoteResult};

/// Completions buffered before spawned requests wait on the receiver
const COMPLETION_BUFFER: usize = 256;

#[derive(Debug, Clone)]
pub struct Driver {
    client: RemoteClient,
    tx: mpsc::Sender<Completion>,
}

impl Driver {
    pub fn new(client: RemoteClient) -> (Self, mpsc::Receiver<Completion>) {
        let (tx, rx) = mpsc::channel(COMPLETION_BUFFER);
        (Self { client, tx }, rx)
    }

    pub fn spawn_all(&self, dispatches: Vec<Dispatch>) {
        for dispatch in dispatches {
            self.spawn(dispatch);
        }
    }

    pub fn spawn(&self, dispatch: Dispatch) -> JoinHandle<()> {
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = perform(&client, &dispatch.call, &dispatch.cancel).await;
            // Receiver gone means the app is shutting down
            let _ = tx.send(Completion::new(dispatch, result)).await;
        })
    }
}

/// Perform one call against the backend
pub async fn perform(
    client: &RemoteClient,
    call: &RemoteCall,
    cancel: &CancellationToken,
) -> RemoteResult<Reply> {
    match call {
        RemoteCall::Execute { program, .. } => {
            client.execute(program, cancel).await.map(Reply::Executed)
        }
        RemoteCall::CreateFile { title } => client
            .create_file(title, "", cancel)
            .await
            .map(Reply::Created),
        RemoteCall::ListFiles => client.list_files(cancel).await.map(Reply::Listed),
        RemoteCall::FetchFile { ticket } => client
            .fetch_file(&ticket.id, cancel)
            .await
            .map(Reply::Fetched),
        RemoteCall::SaveFile { ticket, .. } => client
            .save_file(&ticket.id, &ticket.code, cancel)
            .await
            .map(|()| Reply::Saved),
        RemoteCall::DeleteFile { id } => client
            .delete_file(id, cancel)
            .await
            .map(|next| Reply::Deleted { next }),
    }
}

/// Run `initial` and every follow-up call until nothing is outstanding.
///
/// Used by the headless commands, which have no event loop of their own.
pub async fn settle(
    coordinator: &mut Coordinator,
    driver: &Driver,
    rx: &mut mpsc::Receiver<Completion>,
    initial: Vec<Dispatch>,
) {
    let mut outstanding = initial.len();
    driver.spawn_all(initial);

    while outstanding > 0 {
        let Some(completion) = rx.recv().await else {
            break;
        };
        outstanding -= 1;
        let follow_up = coordinator.apply(completion);
        outstanding += follow_up.len();
        driver.spawn_all(follow_up);
    }
}
