use async_trait::async_trait;

use crate::context::RequestContext;
use crate::middleware::{Flow, Middleware, MiddlewareError, Phase};

/// 프록시된 페이지에서 의미가 없거나 방해가 되는 보안 헤더를 제거합니다.
#[derive(Debug, Clone)]
pub struct HeaderStrip {
    name: &'static str,
    headers: &'static [&'static str],
}

impl HeaderStrip {
    pub fn hsts() -> Self {
        Self {
            name: "hsts",
            headers: &["strict-transport-security"],
        }
    }

    pub fn hpkp() -> Self {
        Self {
            name: "hpkp",
            headers: &["public-key-pins", "public-key-pins-report-only"],
        }
    }

    pub fn csp() -> Self {
        Self {
            name: "csp",
            headers: &[
                "content-security-policy",
                "content-security-policy-report-only",
                "x-content-security-policy",
                "x-webkit-csp",
            ],
        }
    }
}

#[async_trait]
impl Middleware for HeaderStrip {
    fn name(&self) -> &str {
        self.name
    }

    fn phase(&self) -> Phase {
        Phase::Response
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Result<Flow, MiddlewareError> {
        if let Some(remote) = ctx.remote_response.as_mut() {
            for name in self.headers {
                remote.headers.remove(*name);
            }
        }
        Ok(Flow::Continue)
    }
}
