//! HTTP plumbing: request parsing, JSON responses, a pattern router and the
//! hyper accept loop

mod request;
mod response;
mod router;
mod server;

pub use request::{parse_urlencoded, RequestContext};
pub use response::AppResponse;
pub use router::{PathParams, RouteMatch, Router};
pub use server::{BoundServer, Handler, HttpServer};

/// Request-level failures raised before a handler runs
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("Request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
    #[error("Malformed request body: {0}")]
    BadBody(String),
    #[error("Failed to read request body: {0}")]
    Read(String),
}
