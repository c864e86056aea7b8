//! 연결의 첫 요청이 WebSocket 업그레이드인지 미리 살펴봅니다.
//!
//! `peek`만 하므로 업그레이드가 아니면 소켓은 그대로 hyper에 넘어갑니다.
//! keep-alive 연결의 두 번째 이후 요청은 검사하지 않습니다.

use std::time::Duration;

use http::header::{self, HeaderName, HeaderValue};
use http::request::Parts;
use http::{Method, Request, Version};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

/// 요청 헤드 최대 크기
pub const MAX_HEAD_SIZE: usize = 16 * 1024;
const MAX_HEADERS: usize = 64;
const SNIFF_TIMEOUT: Duration = Duration::from_secs(3);
const PEEK_INTERVAL: Duration = Duration::from_millis(5);

/// 파싱된 업그레이드 요청 헤드
#[derive(Debug)]
pub struct UpgradeHead {
    pub parts: Parts,
    /// 요청 헤드 길이
    pub header_len: usize,
    /// peek 시점에 소켓 버퍼에 있던 바이트 수
    pub buffered: usize,
}

#[derive(Debug)]
pub enum Sniff {
    NotUpgrade,
    Incomplete,
    Upgrade(UpgradeHead),
}

pub async fn sniff_upgrade(stream: &TcpStream) -> std::io::Result<Option<UpgradeHead>> {
    let mut buf = vec![0u8; MAX_HEAD_SIZE];
    let sniff = async {
        loop {
            let n = stream.peek(&mut buf).await?;
            if n == 0 {
                return Ok(None);
            }
            match parse_head(&buf[..n]) {
                Sniff::NotUpgrade => return Ok(None),
                Sniff::Upgrade(head) => return Ok(Some(head)),
                Sniff::Incomplete if n == buf.len() => return Ok(None),
                Sniff::Incomplete => sleep(PEEK_INTERVAL).await,
            }
        }
    };
    // 시간 초과면 hyper가 처리
    timeout(SNIFF_TIMEOUT, sniff).await.unwrap_or(Ok(None))
}

pub fn parse_head(buf: &[u8]) -> Sniff {
    const GET: &[u8] = b"GET ";
    if buf.len() < GET.len() {
        return if GET.starts_with(buf) {
            Sniff::Incomplete
        } else {
            Sniff::NotUpgrade
        };
    }
    if !buf.starts_with(GET) {
        return Sniff::NotUpgrade;
    }

    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut request = httparse::Request::new(&mut headers);
    let header_len = match request.parse(buf) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => return Sniff::Incomplete,
        Err(_) => return Sniff::NotUpgrade,
    };

    let is_websocket = request.headers.iter().any(|h| {
        h.name.eq_ignore_ascii_case(header::UPGRADE.as_str())
            && String::from_utf8_lossy(h.value)
                .to_ascii_lowercase()
                .contains("websocket")
    });
    if !is_websocket {
        return Sniff::NotUpgrade;
    }

    match build_parts(&request) {
        Some(parts) => Sniff::Upgrade(UpgradeHead {
            parts,
            header_len,
            buffered: buf.len(),
        }),
        None => Sniff::NotUpgrade,
    }
}

fn build_parts(request: &httparse::Request<'_, '_>) -> Option<Parts> {
    let method = Method::from_bytes(request.method?.as_bytes()).ok()?;
    let version = match request.version? {
        0 => Version::HTTP_10,
        _ => Version::HTTP_11,
    };

    let mut builder = Request::builder()
        .method(method)
        .uri(request.path?)
        .version(version);
    for h in request.headers.iter() {
        let name = HeaderName::from_bytes(h.name.as_bytes()).ok()?;
        let value = HeaderValue::from_bytes(h.value).ok()?;
        builder = builder.header(name, value);
    }
    let (parts, _) = builder.body(()).ok()?.into_parts();
    Some(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    const UPGRADE: &[u8] = b"GET /proxy/http://example.com/chat HTTP/1.1\r\n\
        Host: localhost:8080\r\n\
        Upgrade: WebSocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 13\r\n\r\n";

    #[test]
    fn test_detects_websocket_upgrade() {
        let mut data = UPGRADE.to_vec();
        data.extend_from_slice(b"early");

        match parse_head(&data) {
            Sniff::Upgrade(head) => {
                assert_eq!(head.header_len, UPGRADE.len());
                assert_eq!(head.buffered, UPGRADE.len() + 5);
                assert_eq!(head.parts.uri, "/proxy/http://example.com/chat");
                assert_eq!(head.parts.headers[header::HOST], "localhost:8080");
            }
            other => panic!("업그레이드로 인식되지 않음: {:?}", other),
        }
    }

    #[test]
    fn test_partial_head_is_incomplete() {
        assert!(matches!(parse_head(b"GE"), Sniff::Incomplete));
        assert!(matches!(parse_head(&UPGRADE[..40]), Sniff::Incomplete));
    }

    #[test]
    fn test_plain_requests_are_not_upgrades() {
        assert!(matches!(parse_head(b"POST / HTTP/1.1\r\n\r\n"), Sniff::NotUpgrade));
        assert!(matches!(parse_head(b"\x16\x03\x01"), Sniff::NotUpgrade));
        assert!(matches!(
            parse_head(b"GET / HTTP/1.1\r\nHost: a\r\nConnection: keep-alive\r\n\r\n"),
            Sniff::NotUpgrade
        ));
    }
}
