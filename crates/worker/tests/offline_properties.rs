//! End-to-end behavior of the offline worker through its public API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use shield_client::{Network, NetworkError};
use shield_core::{CacheDb, Request, Response, ResponseType, WorkerConfig};
use shield_worker::{FetchOutcome, Host, Registration, RegistrationOutcome, ResponseSource, ServiceWorker};
use url::Url;

const ORIGIN: &str = "http://127.0.0.1:5000";

fn url(path: &str) -> Url {
    Url::parse(&format!("{ORIGIN}{path}")).unwrap()
}

fn page(body: &str) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
    headers.insert(header::ETAG, HeaderValue::from_static("\"abc\""));
    Response {
        status: StatusCode::OK,
        headers,
        body: Bytes::from(body.to_string()),
        response_type: ResponseType::Basic,
        url: None,
    }
}

/// Network that can be switched off as a whole.
#[derive(Default)]
struct Upstream {
    pages: Mutex<HashMap<String, Response>>,
    offline: Mutex<bool>,
    calls: Mutex<usize>,
}

impl Upstream {
    fn serve(&self, path: &str, response: Response) {
        self.pages.lock().unwrap().insert(url(path).to_string(), response);
    }

    fn go_offline(&self) {
        *self.offline.lock().unwrap() = true;
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Network for Upstream {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        *self.calls.lock().unwrap() += 1;
        if *self.offline.lock().unwrap() {
            return Err(NetworkError::Connect("network unreachable".into()));
        }
        self.pages
            .lock()
            .unwrap()
            .get(request.url.as_str())
            .cloned()
            .ok_or_else(|| NetworkError::Connect(format!("no route to {}", request.url)))
    }
}

struct NoopHost;

#[async_trait]
impl Host for NoopHost {
    async fn skip_waiting(&self) {}
    async fn claim_clients(&self) {}
}

struct Setup {
    worker: ServiceWorker,
    upstream: Arc<Upstream>,
    cache: CacheDb,
}

async fn setup(config: WorkerConfig) -> Setup {
    let cache = CacheDb::open_in_memory().await.unwrap();
    let upstream = Arc::new(Upstream::default());
    for path in &config.manifest {
        upstream.serve(path, page(path));
    }
    let worker = ServiceWorker::new(Arc::new(config), cache.clone(), upstream.clone(), Arc::new(NoopHost)).unwrap();
    Setup { worker, upstream, cache }
}

#[tokio::test]
async fn manifest_is_served_offline_after_setup() {
    let config = WorkerConfig::default();
    let s = setup(config.clone()).await;
    s.worker.on_install().await.unwrap();
    s.upstream.go_offline();
    let calls_before = s.upstream.calls();

    for path in &config.manifest {
        let outcome = s.worker.on_fetch(&Request::get(url(path))).await.unwrap();
        assert_eq!(outcome.source(), ResponseSource::Cache, "{path}");
        assert_eq!(outcome.response().unwrap().body, Bytes::from(path.clone()));
    }
    assert_eq!(s.upstream.calls(), calls_before);
}

#[tokio::test]
async fn cross_origin_requests_are_left_alone() {
    let s = setup(WorkerConfig::default()).await;

    for target in ["https://cdn.example.com/static/style.css", "http://127.0.0.1:5001/api/alertas"] {
        let request = Request::get(Url::parse(target).unwrap());
        let outcome = s.worker.on_fetch(&request).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Passthrough), "{target}");
    }
    assert_eq!(s.upstream.calls(), 0);
    assert!(s.cache.store_names().await.unwrap().is_empty());
}

#[tokio::test]
async fn api_requests_fall_back_to_cache_when_network_fails() {
    let config = WorkerConfig::default();
    let s = setup(config.clone()).await;
    let request = Request::get(url("/api/motorista/status"));
    s.cache
        .open_store(&config.version)
        .await
        .unwrap()
        .put(&request, &page("{\"status\":\"ok\"}"))
        .await
        .unwrap();

    s.upstream.serve("/api/motorista/status", page("{\"status\":\"fresh\"}"));
    let online = s.worker.on_fetch(&request).await.unwrap();
    assert_eq!(online.source(), ResponseSource::Network);

    s.upstream.go_offline();
    let offline = s.worker.on_fetch(&request).await.unwrap();
    assert_eq!(offline.source(), ResponseSource::Cache);
    assert_eq!(offline.response().unwrap().body, Bytes::from_static(b"{\"status\":\"ok\"}"));
}

#[tokio::test]
async fn network_responses_are_stored_exactly() {
    let config = WorkerConfig::default();
    let s = setup(config.clone()).await;
    s.upstream.serve("/historico", page("<h1>historico</h1>"));
    let request = Request::get(url("/historico"));

    let fetched = s.worker.on_fetch(&request).await.unwrap();
    let fetched = fetched.response().unwrap();

    let stored = s.cache.store(&config.version).match_request(&request).await.unwrap().unwrap();
    assert_eq!(stored.status, fetched.status);
    assert_eq!(stored.body, fetched.body);
    assert_eq!(stored.headers.get(header::ETAG), fetched.headers.get(header::ETAG));
    assert_eq!(stored.headers.get(header::CONTENT_TYPE), fetched.headers.get(header::CONTENT_TYPE));
}

#[tokio::test]
async fn uncached_page_offline_gets_503() {
    let s = setup(WorkerConfig::default()).await;
    s.upstream.go_offline();

    let outcome = s.worker.on_fetch(&Request::get(url("/nunca-visitada"))).await.unwrap();
    let response = outcome.response().unwrap();
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body, Bytes::from_static(b"Offline"));
}

#[tokio::test]
async fn activation_keeps_only_current_version_in_any_order() {
    for current_first in [true, false] {
        let config = WorkerConfig { version: "driver-shield-360-v2".into(), ..Default::default() };
        let s = setup(config.clone()).await;
        if current_first {
            s.cache.open_store(&config.version).await.unwrap();
            s.cache.open_store("driver-shield-360-v1").await.unwrap();
        } else {
            s.cache.open_store("driver-shield-360-v1").await.unwrap();
            s.cache.open_store(&config.version).await.unwrap();
        }

        let report = s.worker.on_activate().await.unwrap();
        assert_eq!(report.deleted, vec!["driver-shield-360-v1".to_string()]);
        assert_eq!(s.cache.store_names().await.unwrap(), vec![config.version.clone()]);
    }
}

#[tokio::test]
async fn registration_upgrade_then_offline_round() {
    let cache = CacheDb::open_in_memory().await.unwrap();
    let upstream = Arc::new(Upstream::default());
    let registration = Registration::new();

    let v1 = WorkerConfig::default();
    for path in &v1.manifest {
        upstream.serve(path, page(path));
    }
    let worker_v1 =
        ServiceWorker::new(Arc::new(v1), cache.clone(), upstream.clone(), Arc::new(registration.clone())).unwrap();
    registration.register(&worker_v1).await.unwrap();

    let v2 = WorkerConfig { version: "driver-shield-360-v2".into(), ..Default::default() };
    let worker_v2 =
        ServiceWorker::new(Arc::new(v2), cache.clone(), upstream.clone(), Arc::new(registration.clone())).unwrap();
    let outcome = registration.register(&worker_v2).await.unwrap();
    assert!(matches!(outcome, RegistrationOutcome::Activated { .. }));
    assert_eq!(cache.store_names().await.unwrap(), vec!["driver-shield-360-v2".to_string()]);

    upstream.go_offline();
    let termos = registration.dispatch(&worker_v2, &Request::get(url("/termos"))).await.unwrap();
    assert_eq!(termos.source, ResponseSource::Cache);

    let panic_button = registration
        .dispatch(&worker_v2, &Request::new(Method::POST, url("/api/panico")))
        .await
        .unwrap();
    assert_eq!(panic_button.source, ResponseSource::Offline);
}
