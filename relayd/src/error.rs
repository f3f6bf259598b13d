use common::{headers::apply_cors, RequestError};
use http::{
    header::{ALLOW, CONTENT_TYPE},
    HeaderValue, Response, StatusCode,
};
use tokio::time::error::Elapsed;

use crate::body::{full, ResponseBody};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("host {0:?} not allowed")]
    HostNotAllowed(String),
    #[error("upstream request failed: {0}")]
    UpstreamConnect(#[from] reqwest::Error),
    #[error("upstream timed out")]
    UpstreamTimeout(#[from] Elapsed),
    #[error("client went away")]
    Cancelled,
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Request(RequestError::MethodNotAllowed(_)) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Request(_) => StatusCode::BAD_REQUEST,
            Self::HostNotAllowed(_) => StatusCode::FORBIDDEN,
            Self::UpstreamConnect(_) | Self::UpstreamTimeout(_) | Self::Cancelled => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    fn message(&self) -> &'static str {
        match self {
            Self::Request(RequestError::MethodNotAllowed(_)) => "Method not allowed",
            Self::Request(RequestError::MissingUrl) => "Missing url parameter",
            Self::Request(RequestError::InvalidUrl(_)) => "Invalid url",
            Self::HostNotAllowed(_) => "Host not allowed",
            Self::UpstreamConnect(_) | Self::UpstreamTimeout(_) | Self::Cancelled => {
                "Proxy error"
            }
        }
    }

    /// Plain text response carrying the CORS headers.
    pub fn into_response(self) -> Response<ResponseBody> {
        let status = self.status();
        let mut response = Response::new(full(self.message()));
        *response.status_mut() = status;

        let headers = response.headers_mut();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        if status == StatusCode::METHOD_NOT_ALLOWED {
            headers.insert(
                ALLOW,
                HeaderValue::from_static(common::headers::ALLOWED_METHODS),
            );
        }
        apply_cors(headers);
        response
    }
}

#[cfg(test)]
mod tests {
    use http::{header::ACCESS_CONTROL_ALLOW_ORIGIN, Method};
    use http_body_util::BodyExt;

    use super::*;

    async fn body_text(response: Response<ResponseBody>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn host_not_allowed() {
        let response = Error::HostNotAllowed("evil.example".into()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(body_text(response).await, "Host not allowed");
    }

    #[tokio::test]
    async fn bad_request() {
        let response = Error::from(RequestError::InvalidUrl("nope".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "Invalid url");

        let response = Error::from(RequestError::MissingUrl).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "Missing url parameter");
    }

    #[tokio::test]
    async fn method_not_allowed() {
        let response = Error::from(RequestError::MethodNotAllowed(Method::POST)).into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET, HEAD, OPTIONS");
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn cancelled_is_a_gateway_error() {
        let response = Error::Cancelled.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_text(response).await, "Proxy error");
    }
}
