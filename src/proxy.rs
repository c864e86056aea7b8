//! 기본 HTTP 디스패처
//!
//! 요청 파이프라인 → 업스트림 요청 → 본문 버퍼링 → 응답 파이프라인 순으로 처리합니다.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::config::ExpandedConfig;
use crate::context::{empty_body, strip_hop_by_hop, ProxyBody, RemoteResponse, RequestContext};
use crate::logging::RequestLog;
use crate::middleware::{handle_middleware_error, Flow};

/// http와 https 업스트림을 모두 지원하는 커넥션 풀 클라이언트
pub type UpstreamClient = Client<HttpsConnector<HttpConnector>, ProxyBody>;

pub fn build_client() -> UpstreamClient {
    let connector = HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();
    Client::builder(TokioExecutor::new()).build(connector)
}

pub enum Dispatch {
    Handled(Response<Full<Bytes>>),
    /// 처리하지 않은 요청. 라우터가 폴스루로 넘깁니다.
    Declined(RequestContext),
}

#[async_trait]
pub trait ProxyDispatcher: Send + Sync {
    async fn dispatch(&self, ctx: RequestContext) -> Dispatch;
}

pub struct HttpProxy {
    config: Arc<ExpandedConfig>,
    client: UpstreamClient,
}

impl HttpProxy {
    pub fn new(config: Arc<ExpandedConfig>, client: UpstreamClient) -> Self {
        Self { config, client }
    }

    async fn exchange(
        &self,
        ctx: &mut RequestContext,
        log: &mut RequestLog,
    ) -> Response<Full<Bytes>> {
        match self.config.request_pipeline().run(ctx).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Handled(response)) => return response,
            Err(e) => {
                log.with_error(&e);
                return handle_middleware_error(e);
            }
        }

        let request = match build_upstream_request(ctx) {
            Ok(request) => request,
            Err(e) => {
                log.with_error(&e);
                return error_response(StatusCode::BAD_REQUEST, format!("잘못된 대상 URL: {}", e));
            }
        };

        let remote = match self.client.request(request).await {
            Ok(response) => {
                let (parts, body) = response.into_parts();
                match body.collect().await {
                    Ok(collected) => RemoteResponse {
                        status: parts.status,
                        headers: parts.headers,
                        body: collected.to_bytes(),
                    },
                    Err(e) => {
                        log.with_error(&e);
                        return error_response(
                            StatusCode::BAD_GATEWAY,
                            format!("업스트림 응답 본문 수신 실패: {}", e),
                        );
                    }
                }
            }
            Err(e) => {
                log.with_error(&e);
                return error_response(
                    StatusCode::BAD_GATEWAY,
                    format!("업스트림 요청 실패: {}", e),
                );
            }
        };

        debug!(status = %remote.status, bytes = remote.body.len(), "업스트림 응답 수신");
        ctx.remote_response = Some(remote);

        match self.config.response_pipeline().run(ctx).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Handled(response)) => return response,
            Err(e) => {
                log.with_error(&e);
                return handle_middleware_error(e);
            }
        }

        match ctx.remote_response.take() {
            Some(remote) => remote.into_response(),
            None => error_response(StatusCode::BAD_GATEWAY, "업스트림 응답 없음".to_string()),
        }
    }
}

#[async_trait]
impl ProxyDispatcher for HttpProxy {
    #[instrument(skip_all, fields(url = %ctx.url))]
    async fn dispatch(&self, mut ctx: RequestContext) -> Dispatch {
        if !matches!(ctx.url.scheme(), "http" | "https") {
            debug!(scheme = ctx.url.scheme(), "http(s)가 아닌 대상은 처리하지 않음");
            return Dispatch::Declined(ctx);
        }

        let mut log = RequestLog::new(Uuid::new_v4().to_string());
        log.with_request(&ctx.client_request);
        log.with_target(&ctx.url);

        let response = self.exchange(&mut ctx, &mut log).await;
        log.with_response(response.status());
        log.finish();

        Dispatch::Handled(response)
    }
}

fn build_upstream_request(ctx: &mut RequestContext) -> Result<Request<ProxyBody>, http::Error> {
    let uri: Uri = ctx.url.as_str().parse()?;
    let mut headers = ctx.headers.clone();
    strip_hop_by_hop(&mut headers);

    let mut request = Request::builder()
        .method(ctx.client_request.method.clone())
        .uri(uri)
        .body(ctx.body.take().unwrap_or_else(empty_body))?;
    *request.headers_mut() = headers;
    Ok(request)
}

fn error_response(status: StatusCode, message: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(message)));
    *response.status_mut() = status;
    response
}
