//! Marquee - Core
//!
//! A movie catalog with reviews, per-user hidden movies and community
//! petitions, served as JSON over HTTP.
//!
//! # Architecture
//!
//! - [`store`] - journal-backed tables; every mutation is appended to a
//!   CRC32 + SHA-256 chained event log before it is applied
//! - [`catalog`], [`petitions`], [`accounts`] - services taking the
//!   requester explicitly as an [`models::Identity`]
//! - [`orders`] - read-only purchase ledger and the top customer report
//! - [`session`] - cookie/Bearer sessions with flash messages
//! - [`http`] - hyper server, router and JSON responses
//! - [`app`] - routes, access control and error mapping
//!
//! ```rust,ignore
//! use marquee_core::{App, HttpServer, MarqueeConfig};
//! use std::sync::Arc;
//!
//! let config = MarqueeConfig::load()?;
//! let app = Arc::new(App::from_config(&config)?);
//! HttpServer::new(app, config.server.clone()).bind().await?.serve().await?;
//! ```

pub mod accounts;
pub mod app;
pub mod catalog;
pub mod config; // TOML + MARQUEE_* env configuration
pub mod error;
pub mod http;
pub mod logging;
pub mod models;
pub mod orders;
pub mod password; // Argon2id hashing
pub mod petitions;
pub mod session;
pub mod store;
pub mod views;

pub use app::App;
pub use config::MarqueeConfig;
pub use error::{CatalogError, CatalogResult};
pub use http::{AppResponse, HttpServer, RequestContext};
pub use store::{Store, StoreError};
