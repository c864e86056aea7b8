use async_trait::async_trait;
use http::header::{self, HeaderValue};

use crate::context::RequestContext;
use crate::middleware::{Flow, Middleware, MiddlewareError, Phase};

/// 응답 본문을 재작성할 수 있도록 업스트림에 압축하지 않은 응답을 요청합니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityEncoding;

#[async_trait]
impl Middleware for IdentityEncoding {
    fn name(&self) -> &str {
        "decompress"
    }

    fn phase(&self) -> Phase {
        Phase::Request
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Result<Flow, MiddlewareError> {
        if !ctx.is_websocket {
            ctx.headers
                .insert(header::ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::builtin::test_support::context;

    #[tokio::test]
    async fn test_requests_identity_encoding() {
        let mut ctx = context("http://example.com/");
        ctx.headers
            .insert(header::ACCEPT_ENCODING, "gzip, br".parse().unwrap());

        IdentityEncoding.handle(&mut ctx).await.unwrap();
        assert_eq!(ctx.headers[header::ACCEPT_ENCODING], "identity");
    }

    #[tokio::test]
    async fn test_websocket_is_untouched() {
        let mut ctx = context("http://example.com/");
        ctx.is_websocket = true;

        IdentityEncoding.handle(&mut ctx).await.unwrap();
        assert!(ctx.headers.get(header::ACCEPT_ENCODING).is_none());
    }
}
