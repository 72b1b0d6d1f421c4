//! Parsed request handed to the application

use super::HttpError;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use std::collections::HashMap;

/// Everything a handler needs from a request, with the body already decoded
///
/// Form bodies may be `application/x-www-form-urlencoded` or a flat JSON
/// object; both end up as string fields.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    /// Query string as received, without the `?`
    pub raw_query: Option<String>,
    pub headers: HeaderMap,
    pub form: HashMap<String, String>,
    /// Filled by the router from `:name` segments
    pub params: HashMap<String, String>,
}

impl RequestContext {
    /// Request for `target` (path plus optional `?query`) with no body
    pub fn new(method: Method, target: &str) -> Self {
        let (path, raw_query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (target, None),
        };
        Self {
            method,
            path: path.to_string(),
            query: raw_query.as_deref().map(parse_urlencoded).unwrap_or_default(),
            raw_query,
            headers: HeaderMap::new(),
            form: HashMap::new(),
            params: HashMap::new(),
        }
    }

    pub fn get(target: &str) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn post(target: &str) -> Self {
        Self::new(Method::POST, target)
    }

    /// Build from hyper request parts and the collected body
    pub fn from_parts(parts: &http::request::Parts, body: Bytes) -> Result<Self, HttpError> {
        let mut ctx = Self::new(
            parts.method.clone(),
            parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/"),
        );
        ctx.headers = parts.headers.clone();

        if !body.is_empty() {
            let is_json = parts
                .headers
                .get(http::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|ct| ct.starts_with("application/json"));
            ctx.form = if is_json { parse_json_form(&body)? } else { parse_form_bytes(&body)? };
        }

        Ok(ctx)
    }

    pub fn with_field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.form.insert(name.to_string(), value.into());
        self
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(HeaderName::from_static(name), value);
        }
        self
    }

    /// Form field, empty when absent
    pub fn field(&self, name: &str) -> &str {
        self.form.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Path plus the original query string, as the client asked for it
    pub fn target(&self) -> String {
        match self.raw_query.as_deref() {
            Some(query) if !query.is_empty() => format!("{}?{}", self.path, query),
            _ => self.path.clone(),
        }
    }
}

/// Decode `a=1&b=two+words` pairs; later duplicates win
pub fn parse_urlencoded(input: &str) -> HashMap<String, String> {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

fn parse_form_bytes(body: &[u8]) -> Result<HashMap<String, String>, HttpError> {
    let text = std::str::from_utf8(body).map_err(|e| HttpError::BadBody(e.to_string()))?;
    Ok(parse_urlencoded(text))
}

fn parse_json_form(body: &[u8]) -> Result<HashMap<String, String>, HttpError> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| HttpError::BadBody(e.to_string()))?;
    let serde_json::Value::Object(map) = value else {
        return Err(HttpError::BadBody("expected a JSON object".to_string()));
    };

    Ok(map
        .into_iter()
        .filter_map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Null => return None,
                other => other.to_string(),
            };
            Some((key, value))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_is_split_from_path() {
        let ctx = RequestContext::get("/movies/?search=the+matrix&page=%32");
        assert_eq!(ctx.path, "/movies/");
        assert_eq!(ctx.query_param("search"), Some("the matrix"));
        assert_eq!(ctx.query_param("page"), Some("2"));
        assert_eq!(ctx.target(), "/movies/?search=the+matrix&page=%32");
        assert_eq!(RequestContext::get("/movies/?").target(), "/movies/");
        assert_eq!(RequestContext::get("/movies/").target(), "/movies/");
    }

    #[test]
    fn test_urlencoded_body() {
        let request = http::Request::post("/movies/1/review/create/")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(())
            .unwrap();
        let (parts, _) = request.into_parts();

        let ctx = RequestContext::from_parts(&parts, Bytes::from("comment=Loved+it%21&x")).unwrap();
        assert_eq!(ctx.field("comment"), "Loved it!");
        assert_eq!(ctx.field("x"), "");
        assert_eq!(ctx.field("missing"), "");
    }

    #[test]
    fn test_json_body() {
        let request = http::Request::post("/movies/admin/movies/")
            .header("content-type", "application/json; charset=utf-8")
            .body(())
            .unwrap();
        let (parts, _) = request.into_parts();

        let body = Bytes::from(r#"{"name":"Heat","price":12,"image":null}"#);
        let ctx = RequestContext::from_parts(&parts, body).unwrap();
        assert_eq!(ctx.field("name"), "Heat");
        assert_eq!(ctx.field("price"), "12");
        assert!(!ctx.form.contains_key("image"));

        assert!(RequestContext::from_parts(&parts, Bytes::from("[1,2]")).is_err());
    }
}
