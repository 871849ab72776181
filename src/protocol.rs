use crate::build::RhymeDatabase;
use crate::error::{Result, RhymeError};
use crate::query::query_rhymes;
use crate::types::{QueryRequest, QueryResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Caller -> worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerRequest {
    Load { id: u64, url: String, version: u32 },
    Query { id: u64, request: QueryRequest },
    Shutdown,
}

/// Worker -> caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerReply {
    Loaded { id: u64, version: u32, words: usize },
    LoadFailed { id: u64, error: RhymeError },
    Result { id: u64, result: QueryResult },
}

impl WorkerReply {
    pub fn id(&self) -> u64 {
        match self {
            WorkerReply::Loaded { id, .. }
            | WorkerReply::LoadFailed { id, .. }
            | WorkerReply::Result { id, .. } => *id,
        }
    }
}

pub fn decode_reply(json: &str) -> Result<WorkerReply> {
    serde_json::from_str(json).map_err(|e| RhymeError::MalformedResponse(e.to_string()))
}

/// Fetches the raw dictionary document for a URL
pub trait DictionaryFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<String>;
}

impl<F> DictionaryFetcher for F
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    fn fetch(&self, url: &str) -> Result<String> {
        self(url)
    }
}

/// Blocking HTTP fetch of the dictionary asset
#[cfg(feature = "native")]
#[derive(Debug, Default, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "native")]
impl DictionaryFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String> {
        let load_err = |e: reqwest::Error| RhymeError::DictionaryLoad(format!("{url}: {e}"));
        self.client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.text())
            .map_err(load_err)
    }
}

/// Worker-side state: the loaded dictionary, if any
pub struct WorkerHost {
    database: Option<RhymeDatabase>,
    fetcher: Option<Arc<dyn DictionaryFetcher>>,
}

impl WorkerHost {
    pub fn new(fetcher: Option<Arc<dyn DictionaryFetcher>>) -> Self {
        WorkerHost {
            database: None,
            fetcher,
        }
    }

    pub fn database(&self) -> Option<&RhymeDatabase> {
        self.database.as_ref()
    }

    /// Install a dictionary document directly, bypassing the fetcher
    pub fn install(&mut self, json: &str, version: u32) -> Result<&RhymeDatabase> {
        let database = RhymeDatabase::from_json(json, version)?;
        Ok(self.database.insert(database))
    }

    fn load(&mut self, url: &str, version: u32) -> Result<&RhymeDatabase> {
        let fetcher = self
            .fetcher
            .as_ref()
            .ok_or_else(|| RhymeError::DictionaryLoad("no dictionary fetcher".to_string()))?;
        let body = fetcher.fetch(url)?;
        self.install(&body, version)
    }

    /// Answer one request. `Shutdown` has no reply.
    pub fn handle(&mut self, request: WorkerRequest) -> Option<WorkerReply> {
        match request {
            WorkerRequest::Load { id, url, version } => Some(match self.load(&url, version) {
                Ok(db) => {
                    tracing::info!(url = %url, version, words = db.word_count(), "dictionary loaded");
                    WorkerReply::Loaded {
                        id,
                        version: db.version(),
                        words: db.word_count(),
                    }
                }
                Err(error) => {
                    tracing::warn!(url = %url, %error, "dictionary load failed");
                    WorkerReply::LoadFailed { id, error }
                }
            }),
            WorkerRequest::Query { id, request } => Some(WorkerReply::Result {
                id,
                result: query_rhymes(self.database.as_ref(), &request),
            }),
            WorkerRequest::Shutdown => {
                self.database = None;
                None
            }
        }
    }

    /// Decode a JSON request, answer it and encode the reply.
    /// Undecodable requests are dropped with a warning.
    pub fn handle_json(&mut self, message: &str) -> Option<String> {
        let request: WorkerRequest = match serde_json::from_str(message) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable worker request");
                return None;
            }
        };
        let reply = self.handle(request)?;
        match serde_json::to_string(&reply) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::warn!(id = reply.id(), error = %e, "failed to encode worker reply");
                None
            }
        }
    }
}
