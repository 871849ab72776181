use crate::cache::{CacheKey, SuggestionCache};
use crate::config::EngineConfig;
use crate::error::{Result, RhymeError};
use crate::now_ms;
use crate::protocol::{decode_reply, DictionaryFetcher, WorkerHost, WorkerReply, WorkerRequest};
use crate::query::query_rhymes;
use crate::resolver::CURRENT_VERSION;
use crate::telemetry;
use crate::types::{ClientState, QueryRequest, QueryResult};
use crossbeam_channel::{unbounded, Sender};
use futures::channel::oneshot;
use futures::future::{self, BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::thread;

/// Completion of `init()`; every clone resolves from the same load
pub type InitFuture = Shared<BoxFuture<'static, Result<()>>>;

pub const WARN_FALLBACK: &str = "using fallback generator";

fn encode(request: &WorkerRequest) -> Result<String> {
    serde_json::to_string(request).map_err(|e| RhymeError::InvalidInput(e.to_string()))
}

enum Pending {
    Load(oneshot::Sender<Result<()>>),
    Query(oneshot::Sender<QueryResult>),
}

struct Lifecycle {
    status: ClientState,
    /// Request channel into the worker thread; `None` once it is released
    outbox: Option<Sender<String>>,
    init: Option<InitFuture>,
    failure: Option<RhymeError>,
    warning: Option<String>,
}

struct Inner {
    config: EngineConfig,
    fetcher: Arc<dyn DictionaryFetcher>,
    lifecycle: Mutex<Lifecycle>,
    pending: Mutex<HashMap<u64, Pending>>,
    cache: Mutex<SuggestionCache>,
    next_id: AtomicU64,
}

impl Inner {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Route one reply from the worker to whoever is waiting for it
    fn dispatch(&self, message: &str) {
        let reply = match decode_reply(message) {
            Ok(reply) => reply,
            Err(error) => {
                tracing::warn!(%error, "dropping worker reply");
                return;
            }
        };

        let id = reply.id();
        let entry = self.pending.lock().remove(&id);
        match (entry, reply) {
            (Some(Pending::Query(tx)), WorkerReply::Result { result, .. }) => {
                let _ = tx.send(result);
            }
            (Some(Pending::Load(tx)), WorkerReply::Loaded { version, words, .. }) => {
                self.finish_load(Ok(version));
                tracing::info!(id, version, words, "rhyme worker ready");
                let _ = tx.send(Ok(()));
            }
            (Some(Pending::Load(tx)), WorkerReply::LoadFailed { error, .. }) => {
                self.finish_load(Err(error.clone()));
                let _ = tx.send(Err(error));
            }
            (Some(entry), _) => {
                // wrong reply kind for this id: leave the caller waiting rather than answer wrongly
                let error = RhymeError::MalformedResponse(format!("unexpected reply kind for request {id}"));
                tracing::warn!(%error, "dropping worker reply");
                self.pending.lock().insert(id, entry);
            }
            (None, _) => {
                let error = RhymeError::MalformedResponse(format!("no pending request {id}"));
                tracing::warn!(%error, "dropping worker reply");
            }
        }
    }

    fn finish_load(&self, outcome: Result<u32>) {
        let mut life = self.lifecycle.lock();
        if life.status != ClientState::Initializing {
            return;
        }
        match outcome {
            Ok(version) => {
                life.status = ClientState::Ready;
                life.warning = (version < CURRENT_VERSION).then(|| {
                    format!("dictionary version stale: v{version} loaded, v{CURRENT_VERSION} is current")
                });
            }
            Err(error) => {
                if error.is_load_failure() {
                    tracing::warn!(%error, "rhyme worker falling back to generator");
                } else {
                    tracing::error!(%error, "unexpected load outcome, falling back to generator");
                }
                life.status = ClientState::Error;
                life.warning = Some(format!("{WARN_FALLBACK}: {error}"));
                life.failure = Some(error);
                life.outbox = None;
            }
        }
    }

    /// The worker thread went away; fail over and release every waiting caller
    fn worker_gone(&self) {
        {
            let mut life = self.lifecycle.lock();
            if matches!(life.status, ClientState::Initializing | ClientState::Ready) {
                tracing::warn!("rhyme worker exited unexpectedly");
                let error = RhymeError::DictionaryLoad("rhyme worker exited".to_string());
                life.status = ClientState::Error;
                life.warning = Some(format!("{WARN_FALLBACK}: {error}"));
                life.failure = Some(error);
                life.outbox = None;
            }
        }
        self.pending.lock().clear();
    }
}

/// Spawn the worker thread and the reply router; returns the worker's request channel
fn spawn_worker(inner: &Arc<Inner>) -> Result<Sender<String>> {
    let (request_tx, request_rx) = unbounded::<String>();
    let (reply_tx, reply_rx) = unbounded::<String>();
    let fetcher = Arc::clone(&inner.fetcher);
    let spawn_err = |e: std::io::Error| RhymeError::DictionaryLoad(format!("failed to spawn rhyme worker: {e}"));

    thread::Builder::new()
        .name("rhyme-worker".to_string())
        .spawn(move || {
            let mut host = WorkerHost::new(Some(fetcher));
            for message in request_rx.iter() {
                if let Some(reply) = host.handle_json(&message) {
                    if reply_tx.send(reply).is_err() {
                        break;
                    }
                }
            }
        })
        .map_err(spawn_err)?;

    let weak: Weak<Inner> = Arc::downgrade(inner);
    thread::Builder::new()
        .name("rhyme-router".to_string())
        .spawn(move || {
            for message in reply_rx.iter() {
                match weak.upgrade() {
                    Some(inner) => inner.dispatch(&message),
                    None => return,
                }
            }
            if let Some(inner) = weak.upgrade() {
                inner.worker_gone();
            }
        })
        .map_err(spawn_err)?;

    Ok(request_tx)
}

/// Handle to the background rhyme worker. Clones share one worker.
#[derive(Clone)]
pub struct WorkerClient {
    inner: Arc<Inner>,
}

impl WorkerClient {
    pub fn new(config: EngineConfig, fetcher: Arc<dyn DictionaryFetcher>) -> Self {
        let cache = SuggestionCache::new(config.cache_capacity);
        WorkerClient {
            inner: Arc::new(Inner {
                config,
                fetcher,
                lifecycle: Mutex::new(Lifecycle {
                    status: ClientState::Uninitialized,
                    outbox: None,
                    init: None,
                    failure: None,
                    warning: None,
                }),
                pending: Mutex::new(HashMap::new()),
                cache: Mutex::new(cache),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Client that fetches the dictionary over HTTP
    #[cfg(feature = "native")]
    pub fn with_http(config: EngineConfig) -> Self {
        Self::new(config, Arc::new(crate::protocol::HttpFetcher::default()))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn status(&self) -> ClientState {
        self.inner.lifecycle.lock().status
    }

    /// Non-fatal advisory, e.g. while answering from the fallback generator
    pub fn warning(&self) -> Option<String> {
        let life = self.inner.lifecycle.lock();
        match life.status {
            ClientState::Uninitialized => Some(WARN_FALLBACK.to_string()),
            _ => life.warning.clone(),
        }
    }

    /// Number of cached dictionary results
    pub fn cached_results(&self) -> usize {
        self.inner.cache.lock().len()
    }

    /// Start the worker and load the dictionary.
    ///
    /// Idempotent: while a load is in flight or done, every call resolves from that same load.
    pub fn init(&self) -> InitFuture {
        let mut life = self.inner.lifecycle.lock();
        match life.status {
            ClientState::Ready => return future::ready(Ok(())).boxed().shared(),
            ClientState::Terminated => {
                return future::ready(Err(RhymeError::ClientTerminated)).boxed().shared()
            }
            ClientState::Error => {
                let failure = life
                    .failure
                    .clone()
                    .unwrap_or_else(|| RhymeError::DictionaryLoad("unknown failure".to_string()));
                return future::ready(Err(failure)).boxed().shared();
            }
            ClientState::Initializing => {
                if let Some(init) = &life.init {
                    return init.clone();
                }
            }
            ClientState::Uninitialized => {}
        }

        let config = &self.inner.config;
        let id = self.inner.next_id();
        let (tx, rx) = oneshot::channel();
        let started = spawn_worker(&self.inner).and_then(|outbox| {
            let load = encode(&WorkerRequest::Load {
                id,
                url: config.db_url(),
                version: config.version,
            })?;
            self.inner.pending.lock().insert(id, Pending::Load(tx));
            outbox
                .send(load)
                .map_err(|_| RhymeError::DictionaryLoad("rhyme worker unavailable".to_string()))?;
            Ok(outbox)
        });

        match started {
            Ok(outbox) => {
                tracing::info!(url = %config.db_url(), "initializing rhyme worker");
                life.status = ClientState::Initializing;
                life.warning = Some(WARN_FALLBACK.to_string());
                life.outbox = Some(outbox);
            }
            Err(error) => {
                self.inner.pending.lock().remove(&id);
                life.status = ClientState::Error;
                life.warning = Some(format!("{WARN_FALLBACK}: {error}"));
                life.failure = Some(error.clone());
                return future::ready(Err(error)).boxed().shared();
            }
        }

        let weak = Arc::downgrade(&self.inner);
        let init = async move {
            match rx.await {
                Ok(outcome) => outcome,
                Err(_) => Err(weak
                    .upgrade()
                    .and_then(|inner| {
                        let life = inner.lifecycle.lock();
                        life.failure.clone()
                    })
                    .unwrap_or(RhymeError::ClientTerminated)),
            }
        }
        .boxed()
        .shared();
        life.init = Some(init.clone());
        init
    }

    /// Rhymes for `request`: from the worker when ready, from the fallback generator otherwise.
    pub async fn get_rhymes(&self, request: QueryRequest) -> Result<QueryResult> {
        let start = now_ms();
        let outcome = self.run_query(request).await;
        match &outcome {
            Ok(_) => telemetry::track_request((now_ms() - start).max(0.0).round() as u64),
            Err(_) => telemetry::track_error(),
        }
        outcome
    }

    async fn run_query(&self, mut request: QueryRequest) -> Result<QueryResult> {
        let config = &self.inner.config;
        request.cap.get_or_insert(config.cap);
        request.debounce_ms.get_or_insert(config.debounce_ms);

        let (rx, key) = {
            let mut life = self.inner.lifecycle.lock();
            match life.status {
                ClientState::Terminated => return Err(RhymeError::ClientTerminated),
                ClientState::Ready => {}
                _ => return Ok(query_rhymes(None, &request)),
            }

            let key = CacheKey::for_request(&request);
            if let Some(mut hit) = self.inner.cache.lock().get(&key) {
                telemetry::track_cache_hit();
                hit.touch(now_ms(), request.debounce_ms);
                return Ok(hit);
            }

            let id = self.inner.next_id();
            let message = encode(&WorkerRequest::Query {
                id,
                request: request.clone(),
            })?;
            let (tx, rx) = oneshot::channel();
            self.inner.pending.lock().insert(id, Pending::Query(tx));

            let sent = life
                .outbox
                .as_ref()
                .is_some_and(|outbox| outbox.send(message).is_ok());
            if !sent {
                self.inner.pending.lock().remove(&id);
                let error = RhymeError::DictionaryLoad("rhyme worker unavailable".to_string());
                tracing::warn!(%error, "answering from fallback generator");
                life.status = ClientState::Error;
                life.warning = Some(format!("{WARN_FALLBACK}: {error}"));
                life.failure = Some(error);
                life.outbox = None;
                return Ok(query_rhymes(None, &request));
            }
            (rx, key)
        };

        match rx.await {
            Ok(result) => {
                self.inner.cache.lock().put(key, result.clone());
                Ok(result)
            }
            Err(_) if self.status() == ClientState::Terminated => Err(RhymeError::ClientTerminated),
            Err(_) => Ok(query_rhymes(None, &request)),
        }
    }

    /// Release the worker thread and the loaded dictionary. Irreversible.
    pub fn terminate(&self) -> Result<()> {
        {
            let mut life = self.inner.lifecycle.lock();
            if life.status == ClientState::Terminated {
                return Err(RhymeError::ClientTerminated);
            }
            life.status = ClientState::Terminated;
            life.init = None;
            life.warning = None;
            if let Some(outbox) = life.outbox.take() {
                if let Ok(shutdown) = encode(&WorkerRequest::Shutdown) {
                    let _ = outbox.send(shutdown);
                }
            }
        }
        self.inner.pending.lock().clear();
        self.inner.cache.lock().clear();
        tracing::info!("rhyme worker terminated");
        Ok(())
    }
}

static SHARED: Mutex<Option<WorkerClient>> = parking_lot::const_mutex(None);

/// The process-wide client. `make` runs only when there is none or the last one was terminated.
pub fn shared_client(make: impl FnOnce() -> WorkerClient) -> WorkerClient {
    let mut shared = SHARED.lock();
    match shared.as_ref() {
        Some(client) if client.status() != ClientState::Terminated => client.clone(),
        _ => shared.insert(make()).clone(),
    }
}

/// Status of the process-wide client, `None` if it was never created
pub fn shared_status() -> Option<ClientState> {
    SHARED.lock().as_ref().map(WorkerClient::status)
}
