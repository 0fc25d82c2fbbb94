//! Wire types for the interpreter/file-storage backend
//!
//! Every response envelope may carry a fresh `access_token`; the
//! [`CarriesToken`] trait lets the client pull it out generically.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned file identifier.
///
/// The backend may send ids as JSON numbers or strings; both are kept as text
/// since the client only echoes them back in paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawId", into = "RawId")]
pub struct FileId(String);

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Text(String),
}

impl From<RawId> for FileId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Int(n) => FileId(n.to_string()),
            RawId::Text(s) => FileId(s),
        }
    }
}

impl From<FileId> for RawId {
    fn from(id: FileId) -> Self {
        match id.0.parse::<i64>() {
            Ok(n) => RawId::Int(n),
            Err(_) => RawId::Text(id.0),
        }
    }
}

#[cfg(test)]
impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        FileId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for FileId {
    fn from(n: i64) -> Self {
        FileId(n.to_string())
    }
}

/// Listing projection of a file (no code)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub id: FileId,
    pub title: String,
}

/// Full stored file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub title: String,
    #[serde(default)]
    pub code: String,
}

impl FileRecord {
    pub fn summary(&self) -> FileSummary {
        FileSummary {
            id: self.id.clone(),
            title: self.title.clone(),
        }
    }
}

/// Interpreter verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpKind {
    Ok,
    Error,
}

// ─────────────────────────────────────────────────────────────────────────────
// Request bodies
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct NewFileRequest<'a> {
    pub title: &'a str,
    pub code: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveFileRequest<'a> {
    pub code: &'a str,
}

// ─────────────────────────────────────────────────────────────────────────────
// Response envelopes
// ─────────────────────────────────────────────────────────────────────────────

/// Response envelopes that may rotate the session token
pub trait CarriesToken {
    fn access_token(&self) -> Option<&str>;
}

macro_rules! carries_token {
    ($($ty:ty),* $(,)?) => {
        $(impl CarriesToken for $ty {
            fn access_token(&self) -> Option<&str> {
                self.access_token.as_deref().filter(|t| !t.is_empty())
            }
        })*
    };
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterpResponse {
    pub kind: InterpKind,
    #[serde(default)]
    pub output: serde_json::Value,
    #[serde(default)]
    pub access_token: Option<String>,
}

impl InterpResponse {
    /// Program output as display text
    pub fn output_text(&self) -> String {
        match &self.output {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFileResponse {
    pub file: FileRecord,
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListFilesResponse {
    #[serde(default)]
    pub files: Vec<FileSummary>,
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchFileResponse {
    pub file: FileRecord,
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaveFileResponse {
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteFileResponse {
    #[serde(default)]
    pub next_file: Option<FileId>,
    #[serde(default)]
    pub access_token: Option<String>,
}

carries_token!(
    InterpResponse,
    CreateFileResponse,
    ListFilesResponse,
    FetchFileResponse,
    SaveFileResponse,
    DeleteFileResponse,
);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_ids_accept_numbers_and_strings() {
        let summary: FileSummary = serde_json::from_value(json!({"id": 7, "title": "a.sc"})).unwrap();
        assert_eq!(summary.id, FileId::from(7));

        let summary: FileSummary =
            serde_json::from_value(json!({"id": "f-7", "title": "a.sc"})).unwrap();
        assert_eq!(summary.id.as_str(), "f-7");
    }

    #[test]
    fn numeric_ids_serialize_back_as_numbers() {
        assert_eq!(serde_json::to_value(FileId::from(12)).unwrap(), json!(12));
        assert_eq!(serde_json::to_value(FileId::new("x1")).unwrap(), json!("x1"));
    }

    #[test]
    fn delete_response_without_next_file() {
        let resp: DeleteFileResponse = serde_json::from_value(json!({})).unwrap();
        assert!(resp.next_file.is_none());
        assert!(resp.access_token().is_none());
    }

    #[test]
    fn empty_access_token_is_not_a_rotation() {
        let resp: SaveFileResponse = serde_json::from_value(json!({"access_token": ""})).unwrap();
        assert!(resp.access_token().is_none());
    }

    #[test]
    fn interp_output_renders_non_string_values() {
        let resp: InterpResponse =
            serde_json::from_value(json!({"kind": "ok", "output": ["1", "2"]})).unwrap();
        assert_eq!(resp.output_text(), r#"["1","2"]"#);

        let resp: InterpResponse =
            serde_json::from_value(json!({"kind": "error", "output": "boom"})).unwrap();
        assert_eq!(resp.kind, InterpKind::Error);
        assert_eq!(resp.output_text(), "boom");
    }
}
