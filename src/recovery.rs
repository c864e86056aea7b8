//! 접두사가 빠졌거나 스킴이 없는 요청에서 원래 대상을 추정합니다.
//!
//! 1. `/proxy/example.com/a` → `http://example.com/a`
//! 2. 프록시된 페이지가 상대 경로로 요청한 리소스(`/favicon.ico`)는
//!    Referer에 남아 있는 대상 오리진을 기준으로 복원합니다.
//!
//! 최선 노력 방식입니다. 복원하지 못한 요청은 폴스루로 넘어갑니다.

use http::header;
use http::request::Parts;
use tracing::debug;
use url::{Position, Url};

use crate::codec::UrlCodec;
use crate::context::request_target;
use crate::site::SiteIdentity;

pub struct TargetRecovery<'a> {
    codec: &'a UrlCodec,
}

impl<'a> TargetRecovery<'a> {
    pub fn new(codec: &'a UrlCodec) -> Self {
        Self { codec }
    }

    pub fn recover(&self, parts: &Parts, site: &SiteIdentity) -> Option<String> {
        let target = request_target(&parts.uri);
        let prefix = self.codec.prefix();

        // 접두사 루트는 랜딩 페이지 몫
        if target == prefix || target == prefix.trim_end_matches('/') {
            return None;
        }

        if let Some(rest) = target.strip_prefix(prefix) {
            let recovered = format!("http://{}", rest);
            debug!(path = %target, recovered = %recovered, "스킴 없는 대상 복원");
            return Some(recovered);
        }

        let recovered = self.from_referer(parts, site, target)?;
        debug!(path = %target, recovered = %recovered, "Referer 기준으로 대상 복원");
        Some(recovered)
    }

    fn from_referer(&self, parts: &Parts, site: &SiteIdentity, target: &str) -> Option<String> {
        let referer = parts.headers.get(header::REFERER)?.to_str().ok()?;
        let referer = Url::parse(referer).ok()?;
        if !site.is_own_url(&referer) {
            return None;
        }

        let referer_path = &referer[Position::BeforePath..];
        if !self.codec.is_encoded(referer_path) {
            return None;
        }
        let real = Url::parse(&self.codec.decode(referer_path)).ok()?;
        if !real.has_host() {
            return None;
        }

        Some(format!(
            "{}://{}{}",
            real.scheme(),
            &real[Position::BeforeHost..Position::AfterPort],
            target
        ))
    }
}
