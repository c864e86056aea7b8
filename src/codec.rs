//! 접두사 경로와 실제 대상 URL 사이의 변환
//!
//! `/proxy/http://example.com/a?b=c` ⇄ `http://example.com/a?b=c`

use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlCodec {
    prefix: String,
}

impl UrlCodec {
    /// `prefix`는 정규화된 접두사(`/`로 시작하고 `/`로 끝남)여야 합니다.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// 경로가 `prefix + "http"`로 시작하는지 확인합니다.
    pub fn is_encoded(&self, path: &str) -> bool {
        path.strip_prefix(self.prefix.as_str())
            .map_or(false, |rest| rest.starts_with("http"))
    }

    /// 접두사를 떼어 낸 대상 URL 문자열을 돌려줍니다.
    ///
    /// 어떤 입력에도 실패하지 않습니다. 라우터가 `//`를 `/`로 합친 경우
    /// (`http:/example.com`) 스킴 뒤 슬래시를 복원합니다.
    pub fn decode(&self, prefixed: &str) -> String {
        let target = prefixed
            .strip_prefix(self.prefix.as_str())
            .unwrap_or(prefixed);
        restore_scheme_slashes(target)
    }

    /// 절대 http(s) URL로 파싱합니다. 호스트가 없으면 `None`.
    pub fn canonicalize(&self, target: &str) -> Option<Url> {
        let url = Url::parse(target).ok()?;
        match url.scheme() {
            "http" | "https" if url.has_host() => Some(url),
            _ => None,
        }
    }

    /// 정규형 접두사 경로
    pub fn encode(&self, url: &Url) -> String {
        format!("{}{}", self.prefix, url)
    }
}

fn restore_scheme_slashes(target: &str) -> String {
    if let Some((scheme, rest)) = target.split_once(':') {
        let is_scheme = !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphabetic());
        if is_scheme && rest.starts_with('/') && !rest.starts_with("//") {
            return format!("{}:/{}", scheme, rest);
        }
    }
    target.to_string()
}
