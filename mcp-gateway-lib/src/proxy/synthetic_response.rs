use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use http_body_util::{BodyExt, Empty, Full};
use hyper::Response;
use serde::Serialize;
use tracing::error;

use crate::engine::RespBody;

pub fn empty_body() -> RespBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed()
}

pub fn full_body(bytes: impl Into<Bytes>) -> RespBody {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed()
}

/// Plain-text response with the given status
pub fn text_response(status: StatusCode, body: &'static str) -> Response<RespBody> {
    text_response_with_headers(status, body, &[])
}

/// Plain-text response carrying extra headers (challenges, retry hints)
pub fn text_response_with_headers(
    status: StatusCode,
    body: &'static str,
    headers: &[(HeaderName, HeaderValue)],
) -> Response<RespBody> {
    let mut resp = Response::new(full_body(body));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    for (name, value) in headers {
        resp.headers_mut().insert(name.clone(), value.clone());
    }
    resp
}

/// JSON response; serialization failures degrade to a bare 500
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<RespBody> {
    let bytes = match serde_json::to_vec(body) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "failed to serialize response body");
            return synthetic_error_response(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };
    let mut resp = Response::new(full_body(bytes));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    resp
}

/// Build HTTP response with status code of 4xx and 5xx
pub fn synthetic_error_response(status_code: StatusCode) -> Response<RespBody> {
    let mut resp = Response::new(empty_body());
    *resp.status_mut() = status_code;
    resp
}

pub fn not_found() -> Response<RespBody> {
    text_response(StatusCode::NOT_FOUND, "Not Found")
}

pub fn method_not_allowed() -> Response<RespBody> {
    text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}

pub fn bad_gateway() -> Response<RespBody> {
    text_response(StatusCode::BAD_GATEWAY, "Bad Gateway")
}
