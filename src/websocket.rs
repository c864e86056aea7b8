//! WebSocket 업그레이드 중계
//!
//! 서버가 업그레이드 요청의 헤드를 이미 읽은 원시 소켓을 넘겨주면, 대상을 디코딩한 뒤
//! 업스트림과 핸드셰이크하고 양방향으로 바이트를 복사합니다.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderValue};
use http::request::Parts;
use http::{Request, StatusCode, Uri};
use http_body_util::BodyExt;
use hyper_util::rt::TokioIo;
use tokio::io::{copy_bidirectional, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ExpandedConfig;
use crate::context::{empty_body, ClientSocket, RequestContext};
use crate::logging::RequestLog;
use crate::middleware::{handle_middleware_error, Flow, MiddlewareError};
use crate::proxy::UpstreamClient;
use crate::router::Unblocker;
use crate::site::SiteIdentity;

/// 대상을 알 수 없는 업그레이드 요청에 쓰는 응답. 이 외에는 아무것도 쓰지 않습니다.
pub const BAD_REQUEST_LINE: &[u8] = b"HTTP/1.1 400 Bad Request\r\n\r\n";

#[async_trait]
pub trait WebSocketTunnel: Send + Sync {
    /// 소켓의 수명이 끝날 때까지 업그레이드를 처리합니다.
    async fn dispatch(&self, ctx: RequestContext);
}

impl Unblocker {
    /// 업그레이드 요청 하나를 처리합니다.
    ///
    /// `head`는 요청 헤드 뒤에 이미 읽힌 바이트입니다. 대상을 찾지 못하면
    /// 400 상태 줄만 쓰고 소켓을 닫습니다.
    pub async fn handle_upgrade<S>(&self, parts: Parts, mut socket: S, head: Bytes)
    where
        S: ClientSocket + 'static,
    {
        let site = SiteIdentity::resolve(&parts, self.config());
        let target = self
            .decode_target(&parts)
            .or_else(|| self.recover_target(&parts, &site));

        match target {
            Some(url) => {
                debug!(url = %url, "WebSocket 업그레이드 중계");
                let ctx = RequestContext::websocket(url, parts, Box::new(socket), head, site);
                self.tunnel().dispatch(ctx).await;
            }
            None => {
                warn!(uri = %parts.uri, "WebSocket 대상을 확인할 수 없음");
                reject(&mut socket).await;
            }
        }
    }
}

async fn reject<S: AsyncWrite + Unpin>(socket: &mut S) {
    if let Err(e) = socket.write_all(BAD_REQUEST_LINE).await {
        debug!(error = %e, "400 응답 전송 실패");
    }
    let _ = socket.shutdown().await;
}

#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    #[error(transparent)]
    Middleware(#[from] MiddlewareError),

    #[error("잘못된 업스트림 요청: {0}")]
    Request(#[from] http::Error),

    #[error("업스트림 연결 실패: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    #[error("업스트림 통신 실패: {0}")]
    Hyper(#[from] hyper::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// 기본 WebSocket 중계. HTTP 디스패처와 같은 업스트림 클라이언트를 씁니다.
pub struct UpgradeTunnel {
    config: Arc<ExpandedConfig>,
    client: UpstreamClient,
}

impl UpgradeTunnel {
    pub fn new(config: Arc<ExpandedConfig>, client: UpstreamClient) -> Self {
        Self { config, client }
    }

    async fn relay(
        &self,
        ctx: &mut RequestContext,
        socket: &mut Box<dyn ClientSocket>,
    ) -> Result<StatusCode, TunnelError> {
        if let Flow::Handled(response) = self.config.request_pipeline().run(ctx).await? {
            let (parts, body) = response.into_parts();
            let body = body.collect().await.map(|c| c.to_bytes()).unwrap_or_default();
            write_and_close(socket, parts.status, parts.headers, &body).await?;
            return Ok(parts.status);
        }

        let uri = upstream_uri(ctx)?;
        let mut request = Request::builder()
            .method(ctx.client_request.method.clone())
            .uri(uri)
            .body(empty_body())?;
        *request.headers_mut() = ctx.headers.clone();

        let response = self.client.request(request).await?;
        let status = response.status();

        if status != StatusCode::SWITCHING_PROTOCOLS {
            debug!(status = %status, "업스트림이 업그레이드를 거절함");
            let (parts, body) = response.into_parts();
            let body = body.collect().await?.to_bytes();
            write_and_close(socket, parts.status, parts.headers, &body).await?;
            return Ok(status);
        }

        let head = encode_response_head(status, response.headers());
        let mut upstream = TokioIo::new(hyper::upgrade::on(response).await?);

        socket.write_all(&head).await?;
        if !ctx.client_head.is_empty() {
            upstream.write_all(&ctx.client_head).await?;
        }

        let (from_client, from_upstream) = copy_bidirectional(socket, &mut upstream).await?;
        debug!(from_client, from_upstream, "WebSocket 터널 종료");
        Ok(status)
    }
}

#[async_trait]
impl WebSocketTunnel for UpgradeTunnel {
    async fn dispatch(&self, mut ctx: RequestContext) {
        let Some(mut socket) = ctx.client_socket.take() else {
            warn!(url = %ctx.url, "클라이언트 소켓 없이 업그레이드가 전달됨");
            return;
        };

        let mut log = RequestLog::new(Uuid::new_v4().to_string());
        log.with_request(&ctx.client_request);
        log.with_target(&ctx.url);
        info!(url = %ctx.url, "WebSocket 연결 시작");

        match self.relay(&mut ctx, &mut socket).await {
            Ok(status) => log.with_response(status),
            Err(TunnelError::Middleware(e)) => {
                log.with_error(&e);
                let response = handle_middleware_error(e);
                log.with_response(response.status());
                let (parts, _) = response.into_parts();
                let _ = write_and_close(&mut socket, parts.status, parts.headers, &[]).await;
            }
            Err(e @ (TunnelError::Request(_) | TunnelError::Upstream(_))) => {
                log.with_error(&e);
                log.with_response(StatusCode::BAD_GATEWAY);
                let _ =
                    write_and_close(&mut socket, StatusCode::BAD_GATEWAY, HeaderMap::new(), &[])
                        .await;
            }
            // 응답 헤드를 이미 보냈을 수 있으므로 연결만 닫음
            Err(e) => {
                log.with_error(&e);
                let _ = socket.shutdown().await;
            }
        }
        log.finish();
    }
}

fn upstream_uri(ctx: &RequestContext) -> Result<Uri, http::Error> {
    Ok(ctx.url.as_str().parse::<Uri>()?)
}

/// 상태 줄과 헤더를 HTTP/1.1 응답 헤드로 직렬화합니다.
pub fn encode_response_head(status: StatusCode, headers: &HeaderMap) -> Vec<u8> {
    let mut head = format!(
        "HTTP/1.1 {} {}\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    )
    .into_bytes();
    for (name, value) in headers {
        head.extend_from_slice(name.as_str().as_bytes());
        head.extend_from_slice(b": ");
        head.extend_from_slice(value.as_bytes());
        head.extend_from_slice(b"\r\n");
    }
    head.extend_from_slice(b"\r\n");
    head
}

async fn write_and_close<S: AsyncWrite + Unpin + ?Sized>(
    socket: &mut S,
    status: StatusCode,
    mut headers: HeaderMap,
    body: &[u8],
) -> std::io::Result<()> {
    headers.remove(header::TRANSFER_ENCODING);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
    headers.insert(header::CONNECTION, HeaderValue::from_static("close"));

    socket.write_all(&encode_response_head(status, &headers)).await?;
    socket.write_all(body).await?;
    socket.shutdown().await
}
