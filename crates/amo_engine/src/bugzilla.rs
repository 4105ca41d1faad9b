use std::collections::BTreeMap;
use std::sync::Arc;

use amo_logging::{amo_debug, amo_info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::{ApiError, BugzillaConfig, ConsoleRequest, ConsoleResponse, Transport};

const API_KEY_HEADER: &str = "X-BUGZILLA-API-KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bug {
    pub id: u64,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub resolution: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub component: String,
    /// Every other field Bugzilla returned.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub bug_id: u64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub creation_time: String,
    #[serde(default)]
    pub is_private: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub real_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BugList {
    bugs: Vec<Bug>,
}

#[derive(Debug, Deserialize)]
struct BugComments {
    comments: Vec<Comment>,
}

#[derive(Debug, Deserialize)]
struct CommentList {
    bugs: BTreeMap<String, BugComments>,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Bugzilla REST client. In read-only mode reads still go out while
/// updates and new bugs are only logged.
pub struct BugzillaClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    api_key: Option<String>,
    readonly: bool,
}

impl BugzillaClient {
    pub fn new(transport: Arc<dyn Transport>, config: &BugzillaConfig) -> Self {
        Self {
            transport,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            readonly: config.readonly,
        }
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn is_authenticated(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/rest/{path}", self.base_url.trim_end_matches('/'))
    }

    async fn send<T: DeserializeOwned>(&self, request: ConsoleRequest) -> Result<T, ApiError> {
        let request = match self.api_key.as_deref() {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        };
        let response = self.transport.request(request).await?;
        read_reply(&response)
    }

    pub async fn get(&self, ids: &[u64]) -> Result<Vec<Bug>, ApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let list: BugList = self
            .send(ConsoleRequest::get(self.endpoint("bug")).query("id", join_ids(ids)))
            .await?;
        Ok(list.bugs)
    }

    /// Comments of each bug, keyed by bug id.
    pub async fn comments(&self, ids: &[u64]) -> Result<BTreeMap<u64, Vec<Comment>>, ApiError> {
        let Some(first) = ids.first() else {
            return Ok(BTreeMap::new());
        };
        let mut request = ConsoleRequest::get(self.endpoint(&format!("bug/{first}/comment")));
        for id in ids {
            request = request.query("ids", id);
        }
        let list: CommentList = self.send(request).await?;
        Ok(list
            .bugs
            .into_iter()
            .filter_map(|(id, bug)| id.parse().ok().map(|id| (id, bug.comments)))
            .collect())
    }

    /// Applies `changes` to every bug in `ids`. Returns `None` in read-only mode.
    pub async fn update(&self, ids: &[u64], changes: Value) -> Result<Option<Value>, ApiError> {
        let Some(first) = ids.first() else {
            return Ok(None);
        };
        let mut body = match changes {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("changes".to_string(), other);
                map
            }
        };
        body.insert("ids".to_string(), json!(ids));

        if self.readonly {
            amo_info!("Read-only: not updating bugs {}", join_ids(ids));
            amo_debug!("Skipped update: {}", Value::Object(body));
            return Ok(None);
        }
        if !self.is_authenticated() {
            return Err(ApiError::MissingApiKey("bugzilla updates"));
        }
        let reply: Value = self
            .send(ConsoleRequest::put(self.endpoint(&format!("bug/{first}"))).json(Value::Object(body)))
            .await?;
        Ok(Some(reply))
    }

    pub async fn add_comment(&self, id: u64, text: &str) -> Result<Option<Value>, ApiError> {
        self.update(&[id], json!({ "comment": { "body": text } })).await
    }

    /// Files a new bug and returns its id. Returns `None` in read-only mode.
    pub async fn create(&self, bug: Value) -> Result<Option<u64>, ApiError> {
        if self.readonly {
            amo_info!("Read-only: not filing bug");
            amo_debug!("Skipped bug: {}", bug);
            return Ok(None);
        }
        if !self.is_authenticated() {
            return Err(ApiError::MissingApiKey("filing bugs"));
        }
        let created: Created = self
            .send(ConsoleRequest::post(self.endpoint("bug")).json(bug))
            .await?;
        Ok(Some(created.id))
    }

    /// Account the configured api key belongs to.
    pub async fn whoami(&self) -> Result<Account, ApiError> {
        if !self.is_authenticated() {
            return Err(ApiError::MissingApiKey("whoami"));
        }
        self.send(ConsoleRequest::get(self.endpoint("whoami"))).await
    }
}

/// Bugzilla reports failures as `{ "error": true, "code": .., "message": .. }`,
/// often with a 4xx status.
fn read_reply<T: DeserializeOwned>(response: &ConsoleResponse) -> Result<T, ApiError> {
    if let Ok(body) = response.json::<ErrorBody>() {
        if body.error {
            return Err(ApiError::Bugzilla {
                code: body.code,
                message: body.message,
            });
        }
    }
    if response.status != 200 {
        return Err(ApiError::UnexpectedStatus {
            status: response.status,
            url: response.final_url.to_string(),
        });
    }
    Ok(response.json()?)
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
