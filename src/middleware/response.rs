use bytes::Bytes;
use http::{Response, StatusCode};
use http_body_util::Full;

use super::MiddlewareError;

/// 미들웨어 에러를 HTTP 응답으로 변환합니다.
pub fn handle_middleware_error(err: MiddlewareError) -> Response<Full<Bytes>> {
    let status = match &err {
        MiddlewareError::Execution { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        // 업스트림에서 온 값으로 헤더를 만들지 못한 경우
        MiddlewareError::InvalidHeader(_) => StatusCode::BAD_GATEWAY,
    };

    Response::builder()
        .status(status)
        .body(Full::new(Bytes::from(err.to_string())))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Internal Server Error"))))
}
