use async_trait::async_trait;
use http::header::{self, HeaderValue};
use tracing::trace;
use url::{Position, Url};

use crate::codec::UrlCodec;
use crate::context::RequestContext;
use crate::site::SiteIdentity;
use crate::middleware::{Flow, Middleware, MiddlewareError, Phase};

/// 프록시 안을 가리키는 Referer를 실제 URL로 되돌립니다. 그 외의 Referer는 제거합니다.
#[derive(Debug, Clone)]
pub struct RefererRewrite {
    codec: UrlCodec,
}

impl RefererRewrite {
    pub fn new(codec: UrlCodec) -> Self {
        Self { codec }
    }

    fn real_referer(&self, referer: &str, site: &SiteIdentity) -> Option<Url> {
        let parsed = Url::parse(referer).ok()?;
        if !site.is_own_url(&parsed) {
            return None;
        }
        let path = &parsed[Position::BeforePath..];
        if !self.codec.is_encoded(path) {
            return None;
        }
        self.codec.canonicalize(&self.codec.decode(path))
    }
}

#[async_trait]
impl Middleware for RefererRewrite {
    fn name(&self) -> &str {
        "referer"
    }

    fn phase(&self) -> Phase {
        Phase::Request
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Result<Flow, MiddlewareError> {
        let Some(referer) = ctx.headers.get(header::REFERER) else {
            return Ok(Flow::Continue);
        };

        let real = referer
            .to_str()
            .ok()
            .and_then(|value| self.real_referer(value, &ctx.site));

        match real {
            Some(url) => {
                trace!(referer = %url, "Referer 복원");
                ctx.headers
                    .insert(header::REFERER, HeaderValue::from_str(url.as_str())?);
            }
            None => {
                ctx.headers.remove(header::REFERER);
            }
        }
        Ok(Flow::Continue)
    }
}
