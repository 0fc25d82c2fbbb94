//! Backend access: HTTP client, wire types and failure classification

mod client;
mod error;
pub mod protocol;

pub use client::RemoteClient;
pub use error::{RemoteError, RemoteResult};

#[cfg(test)]
pub use error::CancelStage;
pub use protocol::{FileId, FileRecord, FileSummary, InterpKind, InterpResponse};
