//! JSON responses
//!
//! Handlers produce an [`AppResponse`]; the server turns it into a hyper
//! response. Tests inspect it directly.

use crate::views::FlashMessage;
use bytes::Bytes;
use http::header::{HeaderName, ALLOW, CONTENT_TYPE, LOCATION, SET_COOKIE};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use http_body_util::Full;
use hyper::Response;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
pub struct AppResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl AppResponse {
    pub fn json(status: StatusCode, body: Value) -> Self {
        Self { status, headers: HeaderMap::new(), body }
    }

    /// 303 See Other with `{"redirect": location, "messages": [...]}`
    pub fn redirect(location: &str, messages: &[FlashMessage]) -> Self {
        Self::json(StatusCode::SEE_OTHER, json!({ "redirect": location, "messages": messages }))
            .with_header(LOCATION, location)
    }

    /// Uniform error shape `{"error": code, "message": detail}`
    pub fn error(status: StatusCode, code: &str, message: &str) -> Self {
        Self::json(status, json!({ "error": code, "message": message }))
    }

    /// 405 with an `Allow` header listing the accepted methods
    pub fn method_not_allowed(allowed: &[Method]) -> Self {
        let allow = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
        Self::json(
            StatusCode::METHOD_NOT_ALLOWED,
            json!({ "error": "method_not_allowed", "message": "Method not allowed", "allow": allow }),
        )
        .with_header(ALLOW, &allow)
    }

    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.append(name, value);
            }
            Err(_) => log::warn!("Dropping invalid {} header value", name),
        }
        self
    }

    pub fn header(&self, name: HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn location(&self) -> Option<&str> {
        self.header(LOCATION)
    }

    pub fn set_cookie(&self) -> Option<&str> {
        self.header(SET_COOKIE)
    }

    /// Flash messages carried in the body, if any
    pub fn messages(&self) -> Vec<FlashMessage> {
        self.body
            .get("messages")
            .and_then(|m| serde_json::from_value(m.clone()).ok())
            .unwrap_or_default()
    }

    pub fn into_response(self) -> Response<Full<Bytes>> {
        let body = serde_json::to_vec(&self.body).unwrap_or_default();
        let mut response = Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }
}
