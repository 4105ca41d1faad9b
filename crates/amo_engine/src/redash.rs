use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use amo_core::{
    all_ids_query, involved_accounts_query, map_ids_query, users_for_ids_query, AddonColumn,
    AddonType,
};
use amo_logging::{amo_debug, amo_info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::{ApiError, ConsoleRequest, ConsoleResponse, RedashConfig, Transport};

/// One result row, keyed by column name.
pub type Row = Map<String, Value>;

const JOB_SUCCEEDED: u8 = 3;
const JOB_FAILED: u8 = 4;
const JOB_CANCELLED: u8 = 5;

#[derive(Debug, Deserialize)]
struct Job {
    id: String,
    status: u8,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    query_result_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct QueryResultData {
    rows: Vec<Row>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    data: QueryResultData,
}

/// `POST /api/query_results` answers with a cached result or a queued job.
#[derive(Debug, Deserialize)]
struct Submitted {
    #[serde(default)]
    query_result: Option<QueryResult>,
    #[serde(default)]
    job: Option<Job>,
}

#[derive(Debug, Deserialize)]
struct JobEnvelope {
    job: Job,
}

#[derive(Debug, Deserialize)]
struct ResultEnvelope {
    query_result: QueryResult,
}

/// Developer account behind an add-on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonUser {
    pub user_id: u64,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// Read-only SQL access to the AMO replica through Redash.
pub struct RedashClient {
    transport: Arc<dyn Transport>,
    config: RedashConfig,
}

impl RedashClient {
    pub fn new(transport: Arc<dyn Transport>, config: &RedashConfig) -> Self {
        Self {
            transport,
            config: config.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn authorize(&self, request: ConsoleRequest) -> Result<ConsoleRequest, ApiError> {
        let key = self
            .config
            .api_key
            .as_deref()
            .ok_or(ApiError::MissingApiKey("redash"))?;
        Ok(request.header("Authorization", format!("Key {key}")))
    }

    async fn fetch<T: DeserializeOwned>(&self, request: ConsoleRequest) -> Result<T, ApiError> {
        let request = self.authorize(request)?;
        let response = self.transport.request(request).await?;
        read_json(&response)
    }

    /// Runs `query` against the configured data source and waits for its rows.
    pub async fn sql(&self, query: &str) -> Result<Vec<Row>, ApiError> {
        amo_debug!("Redash query:\n{}", query);
        let submitted: Submitted = self
            .fetch(ConsoleRequest::post(self.endpoint("query_results")).json(json!({
                "query": query,
                "data_source_id": self.config.data_source_id,
                "max_age": 0,
            })))
            .await?;

        if let Some(result) = submitted.query_result {
            return Ok(result.data.rows);
        }
        let Some(mut job) = submitted.job else {
            return Err(ApiError::QueryFailed {
                job: "<none>".to_string(),
                message: "response carried neither a result nor a job".to_string(),
            });
        };

        let started = Instant::now();
        let result_id = loop {
            match job.status {
                JOB_SUCCEEDED => match job.query_result_id {
                    Some(id) => break id,
                    None => {
                        return Err(ApiError::QueryFailed {
                            job: job.id,
                            message: "finished without a query result".to_string(),
                        })
                    }
                },
                JOB_FAILED | JOB_CANCELLED => {
                    return Err(ApiError::QueryFailed {
                        message: job
                            .error
                            .filter(|error| !error.is_empty())
                            .unwrap_or_else(|| format!("status {}", job.status)),
                        job: job.id,
                    })
                }
                _ => {}
            }
            if started.elapsed() >= self.config.poll_timeout() {
                return Err(ApiError::QueryTimeout {
                    job: job.id,
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            tokio::time::sleep(self.config.poll_interval()).await;
            let envelope: JobEnvelope = self
                .fetch(ConsoleRequest::get(self.endpoint(&format!("jobs/{}", job.id))))
                .await?;
            job = envelope.job;
        };

        let envelope: ResultEnvelope = self
            .fetch(ConsoleRequest::get(
                self.endpoint(&format!("query_results/{result_id}")),
            ))
            .await?;
        amo_info!(
            "Redash query finished with {} rows in {:.1}s",
            envelope.query_result.data.rows.len(),
            started.elapsed().as_secs_f32()
        );
        Ok(envelope.query_result.data.rows)
    }

    /// Maps each add-on's `from` identifier to its `to` identifier.
    /// Identifiers with no matching add-on are absent from the map.
    pub async fn map_ids<S: AsRef<str>>(
        &self,
        from: AddonColumn,
        to: AddonColumn,
        ids: &[S],
    ) -> Result<BTreeMap<String, Value>, ApiError> {
        let rows = self.sql(&map_ids_query(from, to, ids)?).await?;
        Ok(rows
            .into_iter()
            .filter_map(|mut row| {
                let key = row.remove(from.name()).as_ref().and_then(value_key)?;
                let value = row.remove(to.name()).unwrap_or(Value::Null);
                Some((key, value))
            })
            .collect())
    }

    /// Every known value of `column`.
    pub async fn all_ids(&self, column: AddonColumn) -> Result<Vec<Value>, ApiError> {
        let rows = self.sql(&all_ids_query(column)).await?;
        Ok(rows
            .into_iter()
            .filter_map(|mut row| row.remove(column.name()))
            .collect())
    }

    pub async fn users_for_ids<S: AsRef<str>>(
        &self,
        column: AddonColumn,
        ids: &[S],
    ) -> Result<Vec<AddonUser>, ApiError> {
        let rows = self.sql(&users_for_ids_query(column, ids)?).await?;
        rows.into_iter().map(from_row).collect()
    }

    /// GUIDs of every add-on sharing a developer with one of `guids`.
    pub async fn involved_accounts<S: AsRef<str>>(
        &self,
        guids: &[S],
        types: &[AddonType],
    ) -> Result<Vec<String>, ApiError> {
        let rows = self.sql(&involved_accounts_query(guids, types)?).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.get("guid").and_then(value_key))
            .collect())
    }
}

fn read_json<T: DeserializeOwned>(response: &ConsoleResponse) -> Result<T, ApiError> {
    if response.status != 200 {
        return Err(ApiError::UnexpectedStatus {
            status: response.status,
            url: response.final_url.to_string(),
        });
    }
    Ok(response.json()?)
}

fn from_row<T: DeserializeOwned>(row: Row) -> Result<T, ApiError> {
    serde_json::from_value(Value::Object(row))
        .map_err(|err| ApiError::Decode(crate::DecodeError::Json(err)))
}

fn value_key(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
