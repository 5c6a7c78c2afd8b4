use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use reqwest::blocking::Client;
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use serde_json::Value;

use super::wire::{NoteResponse, NotesResponse, TreeResponse};
use super::{
    DatabaseInfo, ExpandRequest, GatewayError, GatewayResult, NoteContents, NoteGateway,
    OptimizeReport, SavedNote, SearchRequest, SettingsPayload,
};
use crate::notes::{Note, NoteId, SaveNote, TreeNode};
use crate::settings::Settings;

/// [`NoteGateway`] over the note server's JSON API.
#[derive(Debug)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    database: Mutex<DatabaseInfo>,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("notetree/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            database: Mutex::new(DatabaseInfo::default()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> GatewayResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut request = self.client.request(method.clone(), self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        tracing::debug!(%method, path, "gateway request");
        let response = request
            .send()
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let text = response
            .text()
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        let decoded = decode_response(status, &text);
        match &decoded {
            Ok(_) => self.record_database(&headers),
            Err(err) => tracing::warn!(%method, path, status, %err, "gateway request failed"),
        }
        decoded
    }

    fn record_database(&self, headers: &HeaderMap) {
        let file = headers
            .get(DatabaseInfo::FILE_HEADER)
            .and_then(|value| value.to_str().ok());
        let size = headers
            .get(DatabaseInfo::SIZE_HEADER)
            .and_then(|value| value.to_str().ok());
        *self.database.lock() = DatabaseInfo::from_headers(file, size);
    }
}

const NO_BODY: Option<&()> = None;

/// Turns a raw response into a typed payload. Non-2xx statuses carry the
/// server's `message` when present; a `success: false` body is a semantic
/// failure even on 200.
pub(crate) fn decode_response<T: DeserializeOwned>(status: u16, text: &str) -> GatewayResult<T> {
    let json: Option<Value> = serde_json::from_str(text).ok();
    if !(200..300).contains(&status) {
        let message = json
            .as_ref()
            .and_then(|body| body.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP Error: {status}"));
        return Err(GatewayError::Http { status, message });
    }
    let Some(json) = json else {
        return Err(GatewayError::Decode("response body is not JSON".into()));
    };
    if json.get("success").and_then(Value::as_bool) == Some(false) {
        let message = ["error", "message"]
            .iter()
            .filter_map(|key| json.get(*key).and_then(Value::as_str))
            .find(|message| !message.is_empty())
            .unwrap_or("Request failed")
            .to_string();
        return Err(GatewayError::Semantic(message));
    }
    serde_json::from_value(json).map_err(|err| GatewayError::Decode(err.to_string()))
}

impl NoteGateway for HttpGateway {
    fn fetch_tree(&self) -> GatewayResult<Vec<TreeNode>> {
        let response: TreeResponse = self.send(Method::GET, "/api/notes/tree", NO_BODY)?;
        Ok(response.notes)
    }

    fn fetch_note(&self, id: NoteId) -> GatewayResult<NoteContents> {
        let response: NoteResponse = self.send(Method::GET, &format!("/api/note/{id}"), NO_BODY)?;
        Ok(NoteContents::from_value(&response.note))
    }

    fn create_note(&self, note: &SaveNote) -> GatewayResult<SavedNote> {
        self.send(Method::POST, "/api/note/add", Some(note))
    }

    fn patch_note(&self, id: NoteId, patch: &SaveNote) -> GatewayResult<SavedNote> {
        self.send(Method::PATCH, &format!("/api/note/{id}"), Some(patch))
    }

    fn delete_note(&self, id: NoteId) -> GatewayResult<()> {
        let _: IgnoredAny = self.send(Method::DELETE, &format!("/api/note/{id}"), NO_BODY)?;
        Ok(())
    }

    fn set_expand_state(&self, request: &ExpandRequest) -> GatewayResult<()> {
        let _: IgnoredAny = self.send(Method::POST, "/api/notes/expand", Some(request))?;
        Ok(())
    }

    fn search(&self, request: &SearchRequest) -> GatewayResult<Vec<Note>> {
        let response: NotesResponse = self.send(Method::POST, "/api/notes/search", Some(request))?;
        Ok(response.notes)
    }

    fn fetch_settings(&self) -> GatewayResult<SettingsPayload> {
        self.send(Method::GET, "/api/settings", NO_BODY)
    }

    fn put_settings(&self, settings: &Settings) -> GatewayResult<()> {
        let _: IgnoredAny = self.send(Method::PUT, "/api/settings", Some(settings))?;
        Ok(())
    }

    fn optimize_database(&self) -> GatewayResult<OptimizeReport> {
        self.send(Method::POST, "/api/database/optimize", NO_BODY)
    }

    fn database_info(&self) -> DatabaseInfo {
        self.database.lock().clone()
    }
}
