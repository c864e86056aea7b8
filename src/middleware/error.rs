#[derive(Debug, thiserror::Error)]
pub enum MiddlewareError {
    #[error("미들웨어 {middleware} 실행 실패: {message}")]
    Execution {
        middleware: String,
        message: String,
    },

    #[error("잘못된 헤더 값: {0}")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),
}
