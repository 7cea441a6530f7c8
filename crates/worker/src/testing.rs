//! Scripted capabilities for handler tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, StatusCode, header};
use shield_client::{Network, NetworkError};
use shield_core::{CacheDb, Request, Response, ResponseType, WorkerConfig};
use url::Url;

use crate::host::Host;
use crate::worker::ServiceWorker;

pub const ORIGIN: &str = "http://127.0.0.1:5000";

pub fn url(path: &str) -> Url {
    Url::parse(&format!("{ORIGIN}{path}")).unwrap()
}

pub fn ok_response(body: &str) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    Response {
        status: StatusCode::OK,
        headers,
        body: Bytes::from(body.to_string()),
        response_type: ResponseType::Basic,
        url: None,
    }
}

/// Network double answering from a per-URL script; unknown URLs fail.
#[derive(Default)]
pub struct ScriptedNetwork {
    routes: Mutex<HashMap<String, Result<Response, NetworkError>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedNetwork {
    pub fn respond(&self, path: &str, response: Response) {
        self.routes.lock().unwrap().insert(url(path).to_string(), Ok(response));
    }

    pub fn fail(&self, path: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url(path).to_string(), Err(NetworkError::Connect("offline".into())));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        let key = request.url.to_string();
        self.calls.lock().unwrap().push(key.clone());
        let scripted = self.routes.lock().unwrap().get(&key).cloned();
        match scripted {
            Some(Ok(mut response)) => {
                response.url = Some(request.url.clone());
                Ok(response)
            }
            Some(Err(e)) => Err(e),
            None => Err(NetworkError::Connect(format!("no route to {key}"))),
        }
    }
}

/// Host double counting lifecycle signals.
#[derive(Default)]
pub struct RecordingHost {
    pub skip_waiting: AtomicUsize,
    pub claims: AtomicUsize,
}

#[async_trait]
impl Host for RecordingHost {
    async fn skip_waiting(&self) {
        self.skip_waiting.fetch_add(1, Ordering::SeqCst);
    }

    async fn claim_clients(&self) {
        self.claims.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub worker: ServiceWorker,
    pub network: Arc<ScriptedNetwork>,
    pub host: Arc<RecordingHost>,
    pub cache: CacheDb,
}

pub async fn harness(config: WorkerConfig) -> Harness {
    let cache = CacheDb::open_in_memory().await.unwrap();
    let network = Arc::new(ScriptedNetwork::default());
    let host = Arc::new(RecordingHost::default());
    let worker = ServiceWorker::new(Arc::new(config), cache.clone(), network.clone(), host.clone()).unwrap();
    Harness { worker, network, host, cache }
}

/// Script every default manifest asset to succeed.
pub fn script_manifest(network: &ScriptedNetwork, config: &WorkerConfig) {
    for path in &config.manifest {
        network.respond(path, ok_response(path));
    }
}
