use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

use super::detect::sniff_upgrade;
use super::Result;
use crate::router::{Fallthrough, Unblocker};
use crate::settings::ServerSettings;
use crate::site::ConnectionInfo;

pub struct ServerListener {
    http_listener: TcpListener,
}

impl ServerListener {
    pub async fn bind(settings: &ServerSettings) -> Result<Self> {
        let addr = settings.socket_addr();
        let http_listener = TcpListener::bind(addr)
            .await
            .map_err(|e| {
                error!(error = %e, addr = %addr, "HTTP 포트 바인딩 실패");
                e
            })?;

        info!(addr = %addr, "HTTP 리스너 시작");
        Ok(Self { http_listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.http_listener.local_addr()?)
    }

    pub async fn run(
        self,
        unblocker: Arc<Unblocker>,
        fallthrough: Arc<dyn Fallthrough>,
    ) -> Result<()> {
        loop {
            match self.http_listener.accept().await {
                Ok((stream, remote_addr)) => {
                    let unblocker = unblocker.clone();
                    let fallthrough = fallthrough.clone();
                    tokio::spawn(async move {
                        serve_connection(stream, remote_addr, unblocker, fallthrough).await;
                    });
                }
                Err(e) => {
                    error!(error = %e, "HTTP 연결 수락 실패");
                }
            }
        }
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    remote_addr: SocketAddr,
    unblocker: Arc<Unblocker>,
    fallthrough: Arc<dyn Fallthrough>,
) {
    let info = ConnectionInfo {
        remote_addr: Some(remote_addr),
        encrypted: false,
    };

    match sniff_upgrade(&stream).await {
        Ok(Some(upgrade)) => {
            // peek한 바이트를 소켓에서 실제로 소비
            let mut consumed = vec![0u8; upgrade.buffered];
            if let Err(e) = stream.read_exact(&mut consumed).await {
                error!(error = %e, remote = %remote_addr, "업그레이드 요청 읽기 실패");
                return;
            }
            let head = Bytes::copy_from_slice(&consumed[upgrade.header_len..]);
            let mut parts = upgrade.parts;
            parts.extensions.insert(info);

            unblocker.handle_upgrade(parts, stream, head).await;
            return;
        }
        Ok(None) => {}
        Err(e) => {
            debug!(error = %e, remote = %remote_addr, "업그레이드 검사 실패");
            return;
        }
    }

    let service = service_fn(move |req: Request<Incoming>| {
        let unblocker = unblocker.clone();
        let fallthrough = fallthrough.clone();
        async move {
            let (mut parts, body) = req.into_parts();
            parts.extensions.insert(info);
            let request = Request::from_parts(parts, body.boxed());
            Ok::<_, Infallible>(unblocker.handle(request, Some(fallthrough.as_ref())).await)
        }
    });

    if let Err(err) = http1::Builder::new()
        .serve_connection(TokioIo::new(stream), service)
        .await
    {
        debug!(error = %err, remote = %remote_addr, "HTTP 연결 처리 종료");
    }
}
