#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use web_unblocker::config::UnblockerConfig;
use web_unblocker::context::{empty_body, ProxyBody, RequestContext};
use web_unblocker::middleware::MiddlewareRegistry;
use web_unblocker::proxy::{Dispatch, ProxyDispatcher};
use web_unblocker::router::{Fallthrough, Unblocker};
use web_unblocker::site::SiteIdentity;
use web_unblocker::websocket::WebSocketTunnel;

pub const SITE_HOST: &str = "localhost:8080";

/// `Host: localhost:8080`이 붙은 GET 요청
pub fn get(uri: &str) -> Request<ProxyBody> {
    Request::get(uri)
        .header("host", SITE_HOST)
        .body(empty_body())
        .unwrap()
}

pub fn location(response: &Response<Full<Bytes>>) -> &str {
    response.headers()["location"].to_str().unwrap()
}

// 디스패치된 대상 URL만 기록하는 Mock 디스패처
#[derive(Default)]
pub struct RecordingProxy {
    pub targets: Mutex<Vec<String>>,
    pub decline: bool,
}

impl RecordingProxy {
    pub fn declining() -> Self {
        Self {
            decline: true,
            ..Default::default()
        }
    }

    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProxyDispatcher for RecordingProxy {
    async fn dispatch(&self, ctx: RequestContext) -> Dispatch {
        self.targets.lock().unwrap().push(ctx.url.to_string());
        if self.decline {
            return Dispatch::Declined(ctx);
        }
        Dispatch::Handled(Response::new(Full::new(Bytes::from(ctx.url.to_string()))))
    }
}

#[derive(Debug, Clone)]
pub struct TunnelCall {
    pub url: String,
    pub is_websocket: bool,
    pub head: Bytes,
    pub has_socket: bool,
}

#[derive(Default)]
pub struct RecordingTunnel {
    pub calls: Mutex<Vec<TunnelCall>>,
}

impl RecordingTunnel {
    pub fn calls(&self) -> Vec<TunnelCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebSocketTunnel for RecordingTunnel {
    async fn dispatch(&self, ctx: RequestContext) {
        self.calls.lock().unwrap().push(TunnelCall {
            url: ctx.url.to_string(),
            is_websocket: ctx.is_websocket,
            head: ctx.client_head.clone(),
            has_socket: ctx.client_socket.is_some(),
        });
    }
}

#[derive(Default)]
pub struct CountingFallthrough {
    pub calls: AtomicUsize,
}

impl CountingFallthrough {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fallthrough for CountingFallthrough {
    async fn call(&self, _request: Request<ProxyBody>, _site: &SiteIdentity) -> Response<Full<Bytes>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut response = Response::new(Full::new(Bytes::from_static(b"fallthrough")));
        *response.status_mut() = StatusCode::NOT_FOUND;
        response
    }
}

pub struct Harness {
    pub unblocker: Unblocker,
    pub proxy: Arc<RecordingProxy>,
    pub tunnel: Arc<RecordingTunnel>,
    pub fallthrough: CountingFallthrough,
}

pub fn harness(config: UnblockerConfig) -> Harness {
    harness_with(config, RecordingProxy::default())
}

pub fn harness_with(config: UnblockerConfig, proxy: RecordingProxy) -> Harness {
    let config = config.expand(&MiddlewareRegistry::standard()).unwrap();
    let proxy = Arc::new(proxy);
    let tunnel = Arc::new(RecordingTunnel::default());
    Harness {
        unblocker: Unblocker::new(Arc::new(config), proxy.clone(), tunnel.clone()),
        proxy,
        tunnel,
        fallthrough: CountingFallthrough::default(),
    }
}

impl Harness {
    pub async fn handle(&self, request: Request<ProxyBody>) -> Response<Full<Bytes>> {
        self.unblocker.handle(request, Some(&self.fallthrough)).await
    }
}
