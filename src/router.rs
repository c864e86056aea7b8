//! HTTP 진입점
//!
//! 모든 요청은 셋 중 하나로 끝납니다: 프록시, 정규형으로 리다이렉트, 폴스루.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::request::Parts;
use http::{Request, Response};
use http_body_util::Full;
use tracing::debug;
use url::Url;

use crate::codec::UrlCodec;
use crate::config::ExpandedConfig;
use crate::context::{request_target, ProxyBody, RequestContext};
use crate::proxy::{build_client, Dispatch, HttpProxy, ProxyDispatcher};
use crate::recovery::TargetRecovery;
use crate::site::{redirect_to, SiteIdentity};
use crate::websocket::{UpgradeTunnel, WebSocketTunnel};

/// 프록시가 처리하지 않는 요청을 받는 호스트 애플리케이션 핸들러
#[async_trait]
pub trait Fallthrough: Send + Sync {
    async fn call(&self, request: Request<ProxyBody>, site: &SiteIdentity)
        -> Response<Full<Bytes>>;
}

/// 기본 폴스루. 사이트 오리진(접두사 루트)으로 리다이렉트합니다.
///
/// 접두사 루트 요청 자체도 폴스루로 오므로, 그 경로를 처리하는 핸들러가
/// 앞에 없다면 리다이렉트가 반복됩니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedirectToRoot;

#[async_trait]
impl Fallthrough for RedirectToRoot {
    async fn call(
        &self,
        _request: Request<ProxyBody>,
        site: &SiteIdentity,
    ) -> Response<Full<Bytes>> {
        redirect_to(site, "", None)
    }
}

pub struct Unblocker {
    config: Arc<ExpandedConfig>,
    codec: UrlCodec,
    proxy: Arc<dyn ProxyDispatcher>,
    tunnel: Arc<dyn WebSocketTunnel>,
}

impl Unblocker {
    pub fn new(
        config: Arc<ExpandedConfig>,
        proxy: Arc<dyn ProxyDispatcher>,
        tunnel: Arc<dyn WebSocketTunnel>,
    ) -> Self {
        let codec = UrlCodec::new(config.prefix());
        Self {
            config,
            codec,
            proxy,
            tunnel,
        }
    }

    /// hyper-util 클라이언트 하나를 공유하는 [`HttpProxy`]와 [`UpgradeTunnel`]로 구성합니다.
    pub fn with_default_transport(config: ExpandedConfig) -> Self {
        let config = Arc::new(config);
        let client = build_client();
        let proxy = Arc::new(HttpProxy::new(config.clone(), client.clone()));
        let tunnel = Arc::new(UpgradeTunnel::new(config.clone(), client));
        Self::new(config, proxy, tunnel)
    }

    pub fn config(&self) -> &Arc<ExpandedConfig> {
        &self.config
    }

    pub fn codec(&self) -> &UrlCodec {
        &self.codec
    }

    pub(crate) fn tunnel(&self) -> &Arc<dyn WebSocketTunnel> {
        &self.tunnel
    }

    /// 요청 하나를 처리합니다. `fallthrough`가 없으면 [`RedirectToRoot`]를 씁니다.
    pub async fn handle(
        &self,
        request: Request<ProxyBody>,
        fallthrough: Option<&dyn Fallthrough>,
    ) -> Response<Full<Bytes>> {
        let (parts, body) = request.into_parts();
        let site = SiteIdentity::resolve(&parts, &self.config);
        let fallthrough = fallthrough.unwrap_or(&RedirectToRoot);

        if let Some(url) = self.decode_target(&parts) {
            let raw = request_target(&parts.uri);
            let canonical = self.codec.encode(&url);
            if !matches_canonical(raw, &canonical) {
                debug!(from = %raw, to = %canonical, "정규형으로 리다이렉트");
                return redirect_to(&site, &canonical, None);
            }

            let ctx = RequestContext::http(url, parts, body, site);
            return match self.proxy.dispatch(ctx).await {
                Dispatch::Handled(response) => response,
                Dispatch::Declined(ctx) => {
                    debug!(url = %ctx.url, "디스패처가 요청을 거절함, 폴스루 호출");
                    let site = ctx.site.clone();
                    fallthrough.call(ctx.into_request(), &site).await
                }
            };
        }

        if let Some(url) = self.recover_target(&parts, &site) {
            return redirect_to(&site, &self.codec.encode(&url), None);
        }

        debug!(uri = %parts.uri, "프록시 대상 아님, 폴스루 호출");
        fallthrough
            .call(Request::from_parts(parts, body), &site)
            .await
    }

    /// `prefix + "http"`로 시작하는 경로를 절대 URL로 디코딩합니다.
    pub(crate) fn decode_target(&self, parts: &Parts) -> Option<Url> {
        if !self.codec.is_encoded(parts.uri.path()) {
            return None;
        }
        self.codec
            .canonicalize(&self.codec.decode(request_target(&parts.uri)))
    }

    /// 복원한 대상은 정규화까지 성공해야 합니다. 실패하면 리다이렉트하지 않습니다.
    pub(crate) fn recover_target(&self, parts: &Parts, site: &SiteIdentity) -> Option<Url> {
        let recovered = TargetRecovery::new(&self.codec).recover(parts, site)?;
        self.codec.canonicalize(&recovered)
    }
}

/// 라우터가 `//`를 합친 경로(`http:/x.com`)도 정규형으로 인정합니다.
fn matches_canonical(raw: &str, canonical: &str) -> bool {
    raw == canonical || raw == canonical.replacen("://", ":/", 1)
}
