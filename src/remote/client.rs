//! HTTP client for the interpreter/file-storage backend.

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::error::{CancelStage, RemoteError, RemoteResult};
use super::protocol::*;
use crate::auth::{AuthStore, Token};
use crate::parser::Program;

/// Longest server error body echoed into an error message
const MAX_ERROR_BODY: usize = 200;

/// Client for the backend REST surface.
///
/// Attaches the bearer header whenever a token is held and applies any token
/// the server returns before handing the response to the caller.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    /// HTTP client.
    http: Client,
    /// Base URL without trailing slash (e.g. "http://localhost:5000").
    base_url: String,
    /// Per-request timeout for file operations. Program runs are exempt.
    request_timeout: Duration,
    /// Shared session token.
    auth: AuthStore,
}

impl RemoteClient {
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Duration,
        auth: AuthStore,
    ) -> RemoteResult<Self> {
        let http = Client::builder()
            .build()
            .map_err(|e| RemoteError::Other(format!("Failed to create HTTP client: {}", e)))?;
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();

        Ok(Self {
            http,
            base_url,
            request_timeout,
            auth,
        })
    }

    #[cfg(test)]
    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    /// Submit a parsed program to the interpreter.
    pub async fn execute(
        &self,
        program: &Program,
        cancel: &CancellationToken,
    ) -> RemoteResult<InterpResponse> {
        self.send(Method::POST, "/interp", Some(program), None, cancel)
            .await
    }

    /// Create a file owned by the logged-in user.
    pub async fn create_file(
        &self,
        title: &str,
        code: &str,
        cancel: &CancellationToken,
    ) -> RemoteResult<FileRecord> {
        let body = NewFileRequest { title, code };
        let response: CreateFileResponse = self
            .send(
                Method::POST,
                "/new-file",
                Some(&body),
                Some(self.request_timeout),
                cancel,
            )
            .await?;
        Ok(response.file)
    }

    /// List the logged-in user's files.
    pub async fn list_files(&self, cancel: &CancellationToken) -> RemoteResult<Vec<FileSummary>> {
        let response: ListFilesResponse = self
            .send(
                Method::GET,
                "/fetch-files",
                None::<&()>,
                Some(self.request_timeout),
                cancel,
            )
            .await?;
        Ok(response.files)
    }

    /// Fetch one file with its code.
    pub async fn fetch_file(
        &self,
        id: &FileId,
        cancel: &CancellationToken,
    ) -> RemoteResult<FileRecord> {
        let path = format!("/fetch-file/{}", id);
        let response: FetchFileResponse = self
            .send(
                Method::GET,
                &path,
                None::<&()>,
                Some(self.request_timeout),
                cancel,
            )
            .await?;
        Ok(response.file)
    }

    /// Persist new code for an existing file.
    pub async fn save_file(
        &self,
        id: &FileId,
        code: &str,
        cancel: &CancellationToken,
    ) -> RemoteResult<()> {
        let path = format!("/fetch-file/{}", id);
        let body = SaveFileRequest { code };
        let _: SaveFileResponse = self
            .send(
                Method::PUT,
                &path,
                Some(&body),
                Some(self.request_timeout),
                cancel,
            )
            .await?;
        Ok(())
    }

    /// Delete a file. Returns the server's suggested replacement, if any.
    pub async fn delete_file(
        &self,
        id: &FileId,
        cancel: &CancellationToken,
    ) -> RemoteResult<Option<FileId>> {
        let path = format!("/fetch-file/{}", id);
        let response: DeleteFileResponse = self
            .send(
                Method::DELETE,
                &path,
                None::<&()>,
                Some(self.request_timeout),
                cancel,
            )
            .await?;
        Ok(response.next_file)
    }

    /// Perform one round trip.
    ///
    /// A request withdrawn at any point resolves as `Cancelled`, even when the
    /// server answered successfully in the meantime.
    async fn send<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> RemoteResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + CarriesToken,
    {
        if cancel.is_cancelled() {
            return Err(RemoteError::Cancelled(CancelStage::BeforeSend));
        }

        let stamp = self.auth.begin_request();
        let url = format!("{}{}", self.base_url, path);

        let mut request = self.http.request(method.clone(), &url);
        if let Some(token) = &stamp.token {
            request = request.header(AUTHORIZATION, token.bearer());
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        tracing::debug!(
            %method,
            path,
            seq = stamp.seq,
            authenticated = stamp.token.is_some(),
            "Sending request"
        );

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                return Err(RemoteError::Unauthorized);
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(RemoteError::Other(format!(
                    "server returned {}: {}",
                    status,
                    truncate(body.trim(), MAX_ERROR_BODY)
                )));
            }

            let parsed: T = response.json().await?;
            Ok::<T, RemoteError>(parsed)
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(%method, path, "Request cancelled in flight");
                return Err(RemoteError::Cancelled(CancelStage::InFlight));
            }
            outcome = exchange => outcome,
        };

        // The server may extend the session even on a reply nobody wants anymore
        if let Ok(parsed) = &outcome {
            if let Some(token) = parsed.access_token() {
                if self.auth.rotate_from(&stamp, Token::new(token)) {
                    tracing::trace!(seq = stamp.seq, "Rotated session token");
                }
            }
        }

        if cancel.is_cancelled() {
            tracing::debug!(%method, path, "Response arrived after cancellation");
            return Err(RemoteError::Cancelled(CancelStage::AfterCompletion));
        }

        match &outcome {
            Err(RemoteError::Unauthorized) => {
                tracing::warn!(%method, path, "Server rejected session token")
            }
            Err(e) => tracing::error!(%method, path, "Request failed: {}", e),
            Ok(_) => {}
        }

        outcome
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ProgramParser, SourceParser};
    use axum::{
        extract::{Path, State},
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Backend {
        /// Authorization header seen on each request, in arrival order
        seen_auth: Arc<Mutex<Vec<Option<String>>>>,
    }

    impl Backend {
        fn record(&self, headers: &HeaderMap) {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            self.seen_auth.lock().unwrap().push(auth);
        }

        fn seen(&self) -> Vec<Option<String>> {
            self.seen_auth.lock().unwrap().clone()
        }
    }

    async fn interp(
        State(backend): State<Backend>,
        headers: HeaderMap,
        Json(program): Json<Value>,
    ) -> Json<Value> {
        backend.record(&headers);
        let source = program["source"].as_str().unwrap_or_default().to_string();
        if source.contains("fail") {
            Json(json!({"kind": "error", "output": "runtime error"}))
        } else {
            Json(json!({"kind": "ok", "output": source}))
        }
    }

    async fn list_files(State(backend): State<Backend>, headers: HeaderMap) -> Json<Value> {
        backend.record(&headers);
        Json(json!({
            "files": [{"id": 1, "title": "a.sc"}, {"id": 2, "title": "b.sc"}],
            "access_token": "rotated"
        }))
    }

    async fn fetch_file(
        State(backend): State<Backend>,
        headers: HeaderMap,
        Path(id): Path<String>,
    ) -> Result<Json<Value>, StatusCode> {
        backend.record(&headers);
        match id.as_str() {
            "expired" => Err(StatusCode::UNAUTHORIZED),
            "broken" => Err(StatusCode::INTERNAL_SERVER_ERROR),
            "slow" => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(Json(json!({"file": {"id": "slow", "title": "slow.sc", "code": ""}})))
            }
            _ => Ok(Json(json!({
                "file": {"id": id, "title": "f.sc", "code": "print 1"}
            }))),
        }
    }

    async fn delete_file(State(backend): State<Backend>, headers: HeaderMap) -> Json<Value> {
        backend.record(&headers);
        Json(json!({"next_file": 2}))
    }

    async fn serve() -> (String, Backend) {
        let backend = Backend::default();
        let app = Router::new()
            .route("/interp", post(interp))
            .route("/fetch-files", get(list_files))
            .route("/fetch-file/:id", get(fetch_file).delete(delete_file))
            .with_state(backend.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), backend)
    }

    fn client(base: &str, token: Option<&str>) -> RemoteClient {
        let auth = AuthStore::in_memory(token.map(Token::new));
        RemoteClient::new(base, Duration::from_secs(5), auth).unwrap()
    }

    #[tokio::test]
    async fn anonymous_calls_omit_authorization() {
        let (base, backend) = serve().await;
        let client = client(&base, None);
        let program = SourceParser.parse("print(1)").unwrap();

        let response = client
            .execute(&program, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.kind, InterpKind::Ok);
        assert_eq!(backend.seen(), vec![None]);
    }

    #[tokio::test]
    async fn rotated_token_is_used_by_next_call() {
        let (base, backend) = serve().await;
        let client = client(&base, Some("initial"));
        let cancel = CancellationToken::new();

        let files = client.list_files(&cancel).await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(client.auth().current(), Some(Token::new("rotated")));

        client.fetch_file(&FileId::from(1), &cancel).await.unwrap();
        assert_eq!(
            backend.seen(),
            vec![
                Some("Bearer initial".to_string()),
                Some("Bearer rotated".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn status_401_is_unauthorized() {
        let (base, _) = serve().await;
        let client = client(&base, Some("t"));
        let err = client
            .fetch_file(&FileId::new("expired"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, RemoteError::Unauthorized);
    }

    #[tokio::test]
    async fn server_errors_are_other() {
        let (base, _) = serve().await;
        let client = client(&base, Some("t"));
        let err = client
            .fetch_file(&FileId::new("broken"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Other(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn unreachable_server_is_other() {
        let client = client("http://127.0.0.1:1", Some("t"));
        let err = client
            .list_files(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Other(_)));
    }

    #[tokio::test]
    async fn cancel_in_flight_resolves_cancelled() {
        let (base, _) = serve().await;
        let client = client(&base, Some("t"));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = client
            .fetch_file(&FileId::new("slow"), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, RemoteError::Cancelled(CancelStage::InFlight));
    }

    #[tokio::test]
    async fn already_cancelled_never_reaches_server() {
        let (base, backend) = serve().await;
        let client = client(&base, None);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let program = SourceParser.parse("x").unwrap();
        let err = client.execute(&program, &cancel).await.unwrap_err();

        assert_eq!(err, RemoteError::Cancelled(CancelStage::BeforeSend));
        assert!(backend.seen().is_empty());
    }

    #[tokio::test]
    async fn delete_reports_replacement() {
        let (base, _) = serve().await;
        let client = client(&base, Some("t"));
        let next = client
            .delete_file(&FileId::from(1), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(next, Some(FileId::from(2)));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé…");
        assert_eq!(truncate("ok", 10), "ok");
    }
}
