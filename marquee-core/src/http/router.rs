//! Method + path pattern routing
//!
//! Patterns are split on `/`; a `:name` segment captures that segment.
//! Routes are tried in registration order, so static routes that overlap a
//! parameter route (`/movies/hidden/` vs `/movies/:id/`) go first.

use http::Method;
use std::collections::HashMap;

pub type PathParams = HashMap<String, String>;

struct Route<E> {
    method: Method,
    pattern: &'static str,
    endpoint: E,
}

pub enum RouteMatch<E> {
    Found(E, PathParams),
    /// Path exists but not for this method; carries the accepted methods
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

pub struct Router<E> {
    routes: Vec<Route<E>>,
}

impl<E> Default for Router<E> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<E: Copy> Router<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, method: Method, pattern: &'static str, endpoint: E) -> Self {
        self.routes.push(Route { method, pattern, endpoint });
        self
    }

    pub fn get(self, pattern: &'static str, endpoint: E) -> Self {
        self.route(Method::GET, pattern, endpoint)
    }

    pub fn post(self, pattern: &'static str, endpoint: E) -> Self {
        self.route(Method::POST, pattern, endpoint)
    }

    /// Resolve `path`; a path missing its trailing slash matches as if it had one
    pub fn resolve(&self, method: &Method, path: &str) -> RouteMatch<E> {
        match self.resolve_exact(method, path) {
            RouteMatch::NotFound if !path.ends_with('/') => {
                self.resolve_exact(method, &format!("{}/", path))
            }
            other => other,
        }
    }

    fn resolve_exact(&self, method: &Method, path: &str) -> RouteMatch<E> {
        let mut allowed = Vec::new();
        for route in &self.routes {
            if let Some(params) = extract_params(route.pattern, path) {
                if route.method == *method {
                    return RouteMatch::Found(route.endpoint, params);
                }
                if !allowed.contains(&route.method) {
                    allowed.push(route.method.clone());
                }
            }
        }

        if allowed.is_empty() {
            RouteMatch::NotFound
        } else {
            RouteMatch::MethodNotAllowed(allowed)
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn extract_params(pattern: &str, path: &str) -> Option<PathParams> {
    let pattern_parts: Vec<&str> = pattern.split('/').collect();
    let path_parts: Vec<&str> = path.split('/').collect();

    if pattern_parts.len() != path_parts.len() {
        return None;
    }

    let mut params = HashMap::new();
    for (pattern_part, path_part) in pattern_parts.iter().zip(path_parts.iter()) {
        if let Some(name) = pattern_part.strip_prefix(':') {
            if path_part.is_empty() {
                return None;
            }
            params.insert(name.to_string(), path_part.to_string());
        } else if pattern_part != path_part {
            return None;
        }
    }

    Some(params)
}
