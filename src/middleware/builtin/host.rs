use async_trait::async_trait;
use http::header::{self, HeaderValue};
use url::Position;

use crate::context::RequestContext;
use crate::middleware::{Flow, Middleware, MiddlewareError, Phase};

/// `Host` 헤더를 대상 서버의 `host[:port]`로 바꿉니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostRewrite;

#[async_trait]
impl Middleware for HostRewrite {
    fn name(&self) -> &str {
        "host"
    }

    fn phase(&self) -> Phase {
        Phase::Request
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Result<Flow, MiddlewareError> {
        let authority = &ctx.url[Position::BeforeHost..Position::AfterPort];
        let value = HeaderValue::from_str(authority)?;
        ctx.headers.insert(header::HOST, value);
        Ok(Flow::Continue)
    }
}
