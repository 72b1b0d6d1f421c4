//! Sessions for Marquee
//!
//! - [`SessionStore`] trait with an in-memory implementation
//! - Cookie helpers for the `marquee_session` cookie
//! - [`SessionMiddleware`], which resolves the session of a request from
//!   its cookie or `Authorization: Bearer` header
//!
//! The logged-in user id and pending flash messages live in the session
//! data under [`USER_ID_KEY`] and [`MESSAGES_KEY`].

mod cookie;
mod memory;
mod middleware;
mod store;

pub use cookie::{CookieConfig, SessionCookie};
pub use memory::MemorySessionStore;
pub use middleware::SessionMiddleware;
pub use store::{Session, SessionData, SessionStore, SessionUpdate};

/// Session key holding the authenticated [`crate::models::UserId`]
pub const USER_ID_KEY: &str = "user_id";

/// Session key holding queued [`crate::views::FlashMessage`]s
pub const MESSAGES_KEY: &str = "messages";

/// SameSite cookie policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSitePolicy {
    Strict,
    Lax,
    /// Requires `Secure`
    None,
}

impl SameSitePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            SameSitePolicy::Strict => "Strict",
            SameSitePolicy::Lax => "Lax",
            SameSitePolicy::None => "None",
        }
    }
}
