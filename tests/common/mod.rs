#![allow(dead_code)]

use async_trait::async_trait;
use axum::{Router, extract::ConnectInfo, routing::get};
use axum_test::TestServer;
use linkpulse::api::handlers::{health_handler, redirect_handler};
use linkpulse::api::routes::owner_routes;
use linkpulse::application::services::UrlService;
use linkpulse::domain::events::EventChannelName;
use linkpulse::infrastructure::cache::MemoryCache;
use linkpulse::infrastructure::events::{
    EventChannel, EventChannelConfig, EventHandler, MemoryBroker, MemoryConnector,
};
use linkpulse::infrastructure::persistence::MemoryUrlRepository;
use linkpulse::state::AppState;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tower::Layer;

pub const BASE_URL: &str = "http://sho.rt";
pub const OWNER: &str = "alice";
pub const OTHER_OWNER: &str = "mallory";

#[derive(Clone)]
pub struct MockConnectInfoLayer;

impl<S> Layer<S> for MockConnectInfoLayer {
    type Service = MockConnectInfoService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MockConnectInfoService { inner }
    }
}

#[derive(Clone)]
pub struct MockConnectInfoService<S> {
    inner: S,
}

impl<S, B> tower::Service<axum::http::Request<B>> for MockConnectInfoService<S>
where
    S: tower::Service<axum::http::Request<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: axum::http::Request<B>) -> Self::Future {
        let addr: SocketAddr = "127.0.0.1:12345".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        self.inner.call(req)
    }
}

/// Everything a test needs: the HTTP server plus handles on the in-memory
/// store, cache and broker behind it.
pub struct TestApp {
    pub server: TestServer,
    pub service: Arc<UrlService>,
    pub repository: Arc<MemoryUrlRepository>,
    pub cache: Arc<MemoryCache>,
    pub broker: Arc<MemoryBroker>,
    pub events: EventChannel,
}

impl TestApp {
    /// Waits for every cache write and publish dispatched so far.
    pub async fn settle(&self) {
        assert!(
            self.service
                .side_effects()
                .drain(Duration::from_secs(5))
                .await
        );
    }

    /// Creates a URL through the API and returns the response body.
    pub async fn create(&self, owner: &str, body: Value) -> Value {
        let response = self
            .server
            .post("/api/urls")
            .add_header("x-owner-id", owner)
            .json(&body)
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<Value>()
    }

    pub async fn create_url(&self, original_url: &str) -> Value {
        self.create(OWNER, json!({ "originalUrl": original_url }))
            .await
    }
}

pub fn build_service(
    repository: Arc<MemoryUrlRepository>,
    cache: Arc<MemoryCache>,
    events: EventChannel,
) -> Arc<UrlService> {
    Arc::new(UrlService::new(repository, cache, events, BASE_URL))
}

pub fn app_for(state: AppState) -> Router {
    Router::new()
        .route("/{code}", get(redirect_handler))
        .route("/health", get(health_handler))
        .nest("/api", owner_routes())
        .layer(MockConnectInfoLayer)
        .with_state(state)
}

/// App over in-memory components with a connected event channel.
pub async fn spawn_app() -> TestApp {
    let broker = MemoryBroker::new();
    let events = EventChannel::new(
        Arc::new(MemoryConnector::new(Arc::clone(&broker))),
        EventChannelConfig::default(),
    );
    assert!(events.connect().await);

    spawn_app_with(broker, events)
}

pub fn spawn_app_with(broker: Arc<MemoryBroker>, events: EventChannel) -> TestApp {
    let repository = Arc::new(MemoryUrlRepository::new());
    let cache = Arc::new(MemoryCache::default());
    let service = build_service(Arc::clone(&repository), Arc::clone(&cache), events.clone());

    let server = TestServer::new(app_for(AppState::new(Arc::clone(&service)))).unwrap();

    TestApp {
        server,
        service,
        repository,
        cache,
        broker,
        events,
    }
}

/// Forwards every payload it receives to a channel.
pub struct Recorder {
    tx: mpsc::UnboundedSender<Value>,
}

impl Recorder {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl EventHandler for Recorder {
    async fn handle(&self, payload: Value) -> anyhow::Result<()> {
        let _ = self.tx.send(payload);
        Ok(())
    }
}

/// Subscribes a [`Recorder`] to `channel`.
pub fn record(events: &EventChannel, channel: EventChannelName) -> mpsc::UnboundedReceiver<Value> {
    let (recorder, rx) = Recorder::new();
    assert!(events.consume(channel, recorder));
    rx
}

pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("recorder closed")
}
