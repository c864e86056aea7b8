use std::path::Path;
use std::time::Instant;

use http::request::Parts;
use tracing::{debug, error, info, span, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

use crate::settings::{LogFormat, LogOutput, LogSettings};

const DEFAULT_LOG_FILE: &str = "web_unblocker.log";

/// 전역 subscriber를 설치합니다.
///
/// 반환된 guard가 살아 있는 동안만 비동기 writer가 로그를 내보냅니다.
/// `RUST_LOG`가 있으면 설정된 레벨보다 우선합니다.
pub fn init_logging(settings: &LogSettings) -> WorkerGuard {
    let (writer, guard) = match &settings.output {
        LogOutput::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogOutput::File(path) => {
            let path = Path::new(path);
            let directory = path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .map(|name| name.to_os_string())
                .unwrap_or_else(|| DEFAULT_LOG_FILE.into());
            tracing_appender::non_blocking(tracing_appender::rolling::daily(directory, file_name))
        }
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(settings.level).into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true);

    match settings.format {
        LogFormat::Json => builder.json().with_current_span(true).init(),
        LogFormat::Text => builder
            .with_ansi(matches!(settings.output, LogOutput::Stdout))
            .init(),
    }

    guard
}

/// 프록시 교환 하나에 대한 로그 레코드
#[derive(Debug)]
pub struct RequestLog {
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub host: String,
    pub target: Option<String>,
    pub status_code: u16,
    pub duration_ms: u64,
    pub error: Option<String>,
    started: Instant,
}

impl RequestLog {
    pub fn new(request_id: String) -> Self {
        Self {
            request_id,
            method: String::new(),
            path: String::new(),
            host: String::new(),
            target: None,
            status_code: 0,
            duration_ms: 0,
            error: None,
            started: Instant::now(),
        }
    }

    pub fn with_request(&mut self, parts: &Parts) {
        self.method = parts.method.to_string();
        self.path = parts.uri.path().to_string();
        if let Some(host) = parts.headers.get(http::header::HOST) {
            self.host = host.to_str().unwrap_or_default().to_string();
        }

        debug!(
            request_id = %self.request_id,
            method = %self.method,
            path = %self.path,
            host = %self.host,
            "요청 수신"
        );
    }

    pub fn with_target(&mut self, target: impl ToString) {
        self.target = Some(target.to_string());
    }

    pub fn with_response(&mut self, status: http::StatusCode) {
        self.status_code = status.as_u16();
    }

    pub fn with_error(&mut self, error: impl std::fmt::Display) {
        let error_msg = error.to_string();
        error!(
            request_id = %self.request_id,
            error = %error_msg,
            "요청 처리 중 오류"
        );
        self.error = Some(error_msg);
    }

    /// 경과 시간을 기록하고 로그를 남깁니다.
    pub fn finish(mut self) {
        self.duration_ms = self.started.elapsed().as_millis() as u64;
        log_request(&self);
    }
}

pub fn log_request(log: &RequestLog) {
    let level = if log.error.is_some() {
        Level::ERROR
    } else if log.status_code >= 400 {
        Level::WARN
    } else {
        Level::INFO
    };

    let span = span!(
        Level::INFO,
        "request",
        request_id = %log.request_id,
        method = %log.method,
        path = %log.path,
        host = %log.host,
        status = %log.status_code,
        duration_ms = %log.duration_ms
    );
    let _enter = span.enter();

    match level {
        Level::ERROR => error!(target_url = ?log.target, error = ?log.error, "요청 실패"),
        Level::WARN => warn!(target_url = ?log.target, "요청이 오류 상태로 완료됨"),
        _ => info!(target_url = ?log.target, "요청 완료"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Request, StatusCode};

    #[test]
    fn test_request_log_collects_fields() {
        let (parts, _) = Request::get("/proxy/http://example.com/a?b=c")
            .header("host", "localhost:8080")
            .body(())
            .unwrap()
            .into_parts();

        let mut log = RequestLog::new("id-1".to_string());
        log.with_request(&parts);
        log.with_target("http://example.com/a?b=c");
        log.with_response(StatusCode::BAD_GATEWAY);
        log.with_error("연결 거부");

        assert_eq!(log.method, "GET");
        assert_eq!(log.path, "/proxy/http://example.com/a");
        assert_eq!(log.host, "localhost:8080");
        assert_eq!(log.target.as_deref(), Some("http://example.com/a?b=c"));
        assert_eq!(log.status_code, 502);
        assert_eq!(log.error.as_deref(), Some("연결 거부"));
        log.finish();
    }
}
