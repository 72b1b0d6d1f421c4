//! The Marquee application
//!
//! [`App::handle`] routes a [`RequestContext`], resolves the session and
//! the requesting user, enforces the endpoint's [`Access`] level, runs the
//! handler and maps [`CatalogError`]s to responses:
//!
//! | error             | response                                |
//! |-------------------|-----------------------------------------|
//! | `NotFound`        | 404                                     |
//! | `Validation`      | 422 (review endpoints flash + redirect) |
//! | `Unauthenticated` | 303 to the login page with `next`       |
//! | `Forbidden`       | 403                                     |
//! | storage/ledger    | 500, detail logged only                 |

mod accounts;
mod movies;
mod petitions;
mod reports;
mod reviews;
mod routes;

pub use routes::{router, Access, Endpoint};

use crate::accounts::AccountService;
use crate::catalog::CatalogService;
use crate::config::{MarqueeConfig, SessionsConfig};
use crate::error::{CatalogError, CatalogResult};
use crate::http::{AppResponse, Handler, RequestContext, RouteMatch, Router};
use crate::models::{Identity, User};
use crate::orders::{JsonFilePurchaseLedger, MemoryPurchaseLedger, PurchaseLedger};
use crate::petitions::PetitionService;
use crate::session::{MemorySessionStore, Session, SessionMiddleware};
use crate::store::{Store, UserRepository};
use crate::views::FlashMessage;
use anyhow::Context;
use async_trait::async_trait;
use http::header::SET_COOKIE;
use http::{HeaderMap, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;

/// What a handler produced, before session and flash handling
pub(crate) enum Reply {
    Page(StatusCode, Value),
    Redirect(String),
}

impl Reply {
    fn page<T: Serialize>(view: &T) -> Reply {
        Reply::page_with_status(StatusCode::OK, view)
    }

    fn page_with_status<T: Serialize>(status: StatusCode, view: &T) -> Reply {
        match serde_json::to_value(view) {
            Ok(body) => Reply::Page(status, body),
            Err(e) => {
                log::error!("Failed to serialize view: {}", e);
                Reply::Page(StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "internal_error" }))
            }
        }
    }

    fn redirect(location: impl Into<String>) -> Reply {
        Reply::Redirect(location.into())
    }
}

/// Session state of one request
///
/// A session loaded from the store is never written back whole: only the
/// flash messages this request queued and showed are merged into it.
#[derive(Default)]
pub(crate) struct Visit {
    session: Option<Session>,
    identity: Option<Identity>,
    /// Created during this request; stored whole
    fresh: bool,
    pushed: Vec<FlashMessage>,
    shown: Vec<FlashMessage>,
    issue_cookie: bool,
    clear_cookie: bool,
}

impl Visit {
    fn user(&self) -> CatalogResult<Identity> {
        self.identity.clone().ok_or(CatalogError::Unauthenticated)
    }

    fn queued_messages(&self) -> Vec<FlashMessage> {
        self.session
            .as_ref()
            .and_then(|s| s.get::<Vec<FlashMessage>>(crate::session::MESSAGES_KEY))
            .unwrap_or_default()
    }

    fn take_messages(&mut self) -> Vec<FlashMessage> {
        match self.session.as_mut() {
            Some(session) if session.has_messages() => {
                let messages = session.take_messages();
                self.shown.extend(messages.iter().cloned());
                messages
            }
            _ => Vec::new(),
        }
    }
}

pub struct App {
    store: Arc<Store>,
    catalog: CatalogService<Store>,
    petitions: PetitionService<Store>,
    accounts: AccountService<Store>,
    sessions: SessionMiddleware<MemorySessionStore>,
    ledger: Arc<dyn PurchaseLedger>,
    router: Router<Endpoint>,
    login_path: String,
}

impl App {
    pub fn new(store: Arc<Store>, ledger: Arc<dyn PurchaseLedger>, config: &SessionsConfig) -> Self {
        Self {
            catalog: CatalogService::new(store.clone()),
            petitions: PetitionService::new(store.clone()),
            accounts: AccountService::new(store.clone()),
            sessions: SessionMiddleware::new(Arc::new(MemorySessionStore::new()), config),
            store,
            ledger,
            router: router(),
            login_path: config.login_path.clone(),
        }
    }

    /// Open the store and the purchase ledger described by `config`
    pub fn from_config(config: &MarqueeConfig) -> anyhow::Result<Self> {
        let store = Store::open(&config.storage).with_context(|| {
            format!("Failed to open store at {}", config.storage.data_dir.display())
        })?;

        let ledger: Arc<dyn PurchaseLedger> = match &config.orders.ledger_path {
            Some(path) => {
                log::info!("Purchase ledger: {}", path.display());
                Arc::new(JsonFilePurchaseLedger::new(path))
            }
            None => {
                log::info!("No purchase ledger configured, top customer report will be empty");
                Arc::new(MemoryPurchaseLedger::default())
            }
        };

        Ok(Self::new(Arc::new(store), ledger, &config.sessions))
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn accounts(&self) -> &AccountService<Store> {
        &self.accounts
    }

    pub fn catalog(&self) -> &CatalogService<Store> {
        &self.catalog
    }

    pub fn session_store(&self) -> Arc<MemorySessionStore> {
        self.sessions.store()
    }

    pub async fn handle(&self, mut ctx: RequestContext) -> AppResponse {
        let endpoint = match self.router.resolve(&ctx.method, &ctx.path) {
            RouteMatch::Found(endpoint, params) => {
                ctx.params = params;
                endpoint
            }
            RouteMatch::MethodNotAllowed(allowed) => return AppResponse::method_not_allowed(&allowed),
            RouteMatch::NotFound => {
                return AppResponse::error(StatusCode::NOT_FOUND, "not_found", "Page not found")
            }
        };

        let mut visit = self.open_visit(&ctx.headers).await;

        let result = match authorize(endpoint.access(), visit.identity.as_ref()) {
            Ok(()) => self.dispatch(endpoint, &ctx, &mut visit).await,
            Err(e) => Err(e),
        };

        let response = match result {
            Ok(Reply::Page(status, mut body)) => {
                let messages = visit.take_messages();
                if let Value::Object(map) = &mut body {
                    map.insert("messages".to_string(), json!(messages));
                }
                AppResponse::json(status, body)
            }
            Ok(Reply::Redirect(location)) => AppResponse::redirect(&location, &visit.queued_messages()),
            Err(err) => self.error_response(err, &ctx),
        };

        self.close_visit(visit, response).await
    }

    async fn dispatch(
        &self,
        endpoint: Endpoint,
        ctx: &RequestContext,
        visit: &mut Visit,
    ) -> CatalogResult<Reply> {
        match endpoint {
            Endpoint::Health => self.health().await,
            Endpoint::MovieList => self.movie_list(ctx, visit).await,
            Endpoint::MovieDetail => self.movie_detail(ctx, visit).await,
            Endpoint::HiddenList => self.hidden_list(visit).await,
            Endpoint::HideMovie => self.hide_movie(ctx, visit).await,
            Endpoint::UnhideMovie => self.unhide_movie(ctx, visit).await,
            Endpoint::ReviewCreate => self.review_create(ctx, visit).await,
            Endpoint::ReviewEditForm => self.review_edit_form(ctx, visit).await,
            Endpoint::ReviewEditSubmit => self.review_edit_submit(ctx, visit).await,
            Endpoint::ReviewDelete => self.review_delete(ctx, visit).await,
            Endpoint::PetitionList => self.petition_list(visit).await,
            Endpoint::PetitionForm => Ok(self.petition_form()),
            Endpoint::PetitionCreate => self.petition_create(ctx, visit).await,
            Endpoint::PetitionVote => self.petition_vote(ctx, visit).await,
            Endpoint::PetitionUnvote => self.petition_unvote(ctx, visit).await,
            Endpoint::PetitionApprove => self.petition_decide(ctx, visit, true).await,
            Endpoint::PetitionReject => self.petition_decide(ctx, visit, false).await,
            Endpoint::TopCustomer => self.top_customer().await,
            Endpoint::AdminAddMovie => self.admin_add_movie(ctx, visit).await,
            Endpoint::AdminRemoveMovie => self.admin_remove_movie(ctx, visit).await,
            Endpoint::Signup => self.signup(ctx, visit).await,
            Endpoint::LoginForm => Ok(self.login_form(ctx)),
            Endpoint::Login => self.login(ctx, visit).await,
            Endpoint::Logout => self.logout(visit).await,
        }
    }

    async fn open_visit(&self, headers: &HeaderMap) -> Visit {
        let session = match self.sessions.extract_session(headers).await {
            Ok(session) => session,
            Err(e) => {
                log::warn!("Session lookup failed: {}", e);
                None
            }
        };

        let identity = match session.as_ref().and_then(Session::user_id) {
            Some(id) => match self.store.user(id).await {
                Ok(user) => user.as_ref().map(Identity::from),
                Err(e) => {
                    log::error!("Failed to load user {}: {}", id, e);
                    None
                }
            },
            None => None,
        };

        Visit { session, identity, ..Visit::default() }
    }

    async fn close_visit(&self, visit: Visit, mut response: AppResponse) -> AppResponse {
        if let Some(session) = visit.session {
            if visit.issue_cookie {
                response = response.with_header(SET_COOKIE, &self.sessions.set_cookie(&session));
            }
            let saved = if visit.fresh {
                self.sessions.save(session).await
            } else {
                self.sessions.merge(&session.id, visit.shown, visit.pushed).await
            };
            if let Err(e) = saved {
                log::error!("Failed to save session: {}", e);
            }
        } else if visit.clear_cookie {
            response = response.with_header(SET_COOKIE, &self.sessions.delete_cookie());
        }
        response
    }

    /// Queue a flash message, starting an anonymous session if needed
    fn flash(&self, visit: &mut Visit, message: FlashMessage) {
        if visit.session.is_none() {
            visit.session = Some(self.sessions.new_session());
            visit.fresh = true;
            visit.issue_cookie = true;
        }
        if let Some(session) = visit.session.as_mut() {
            if let Err(e) = session.push_message(message.clone()) {
                log::warn!("Failed to queue flash message: {}", e);
                return;
            }
            visit.pushed.push(message);
        }
    }

    /// Replace the visit's session with a fresh one owned by `user`
    ///
    /// Queued flash messages move to the new session.
    async fn start_session(&self, visit: &mut Visit, user: &User) -> String {
        let mut carried = Vec::new();
        if let Some(mut old) = visit.session.take() {
            carried = old.take_messages();
            if let Err(e) = self.sessions.destroy(&old.id).await {
                log::warn!("Failed to drop previous session: {}", e);
            }
        }

        let mut session = self.sessions.new_session();
        if let Err(e) = session.set_user_id(user.id) {
            log::error!("Failed to bind session to user {}: {}", user.id, e);
        }
        for message in carried {
            if let Err(e) = session.push_message(message) {
                log::warn!("Failed to carry flash message: {}", e);
            }
        }

        let token = session.id.clone();
        visit.session = Some(session);
        visit.identity = Some(Identity::from(user));
        visit.fresh = true;
        visit.pushed.clear();
        visit.shown.clear();
        visit.issue_cookie = true;
        token
    }

    async fn end_session(&self, visit: &mut Visit) {
        if let Some(session) = visit.session.take() {
            if let Err(e) = self.sessions.destroy(&session.id).await {
                log::warn!("Failed to delete session: {}", e);
            }
        }
        visit.identity = None;
        visit.fresh = false;
        visit.pushed.clear();
        visit.shown.clear();
        visit.issue_cookie = false;
        visit.clear_cookie = true;
    }

    fn login_redirect(&self, ctx: &RequestContext) -> AppResponse {
        let location = format!("{}?next={}", self.login_path, urlencoding::encode(&ctx.target()));
        AppResponse::redirect(&location, &[])
    }

    fn error_response(&self, err: CatalogError, ctx: &RequestContext) -> AppResponse {
        match &err {
            CatalogError::Unauthenticated => self.login_redirect(ctx),
            CatalogError::NotFound(_) => {
                AppResponse::error(StatusCode::NOT_FOUND, err.code(), &err.to_string())
            }
            CatalogError::Forbidden => AppResponse::error(
                StatusCode::FORBIDDEN,
                err.code(),
                "You do not have permission to perform this action",
            ),
            CatalogError::Validation(errors) => AppResponse::json(
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": err.code(), "message": err.to_string(), "errors": errors }),
            ),
            CatalogError::InvalidCredentials => {
                AppResponse::error(StatusCode::UNAUTHORIZED, err.code(), &err.to_string())
            }
            CatalogError::Store(_) | CatalogError::Password(_) | CatalogError::Ledger(_) => {
                log::error!("{} {} failed: {}", ctx.method, ctx.path, err);
                AppResponse::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    err.code(),
                    "Internal server error",
                )
            }
        }
    }
}

#[async_trait]
impl Handler for App {
    async fn handle(&self, request: RequestContext) -> AppResponse {
        App::handle(self, request).await
    }
}

fn authorize(access: Access, identity: Option<&Identity>) -> CatalogResult<()> {
    match (access, identity) {
        (Access::Public, _) => Ok(()),
        (_, None) => Err(CatalogError::Unauthenticated),
        (Access::User, Some(_)) => Ok(()),
        (Access::Staff, Some(user)) if user.is_staff => Ok(()),
        (Access::Staff, Some(user)) => {
            log::warn!("User {} denied staff endpoint", user.username);
            Err(CatalogError::Forbidden)
        }
    }
}

/// Path parameter parsed as an id; anything unparsable is not-found
fn id_param<T: FromStr>(ctx: &RequestContext, name: &str, what: &'static str) -> CatalogResult<T> {
    ctx.param(name).and_then(|raw| raw.parse().ok()).ok_or(CatalogError::NotFound(what))
}

/// Only same-site absolute paths are followed after login
///
/// Browsers read `\` as `/` and drop tabs and newlines, so `/\host` and
/// `/\t/host` are protocol-relative too.
fn safe_next(next: Option<&str>) -> Option<String> {
    next.filter(|n| {
        n.starts_with('/')
            && !n.starts_with("//")
            && !n.contains('\\')
            && !n.chars().any(char::is_control)
    })
    .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserId;

    #[test]
    fn test_authorize_matrix() {
        let user = Identity { id: UserId(1), username: "ana".into(), is_staff: false };
        let staff = Identity { id: UserId(2), username: "sam".into(), is_staff: true };

        assert!(authorize(Access::Public, None).is_ok());
        assert!(matches!(authorize(Access::User, None), Err(CatalogError::Unauthenticated)));
        assert!(authorize(Access::User, Some(&user)).is_ok());
        assert!(matches!(authorize(Access::Staff, Some(&user)), Err(CatalogError::Forbidden)));
        assert!(authorize(Access::Staff, Some(&staff)).is_ok());
    }

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/movies/hidden/")), Some("/movies/hidden/".to_string()));
        assert_eq!(safe_next(Some("/movies/?search=x")), Some("/movies/?search=x".to_string()));
        assert_eq!(safe_next(Some("//evil.example")), None);
        assert_eq!(safe_next(Some("/\\evil.example/")), None);
        assert_eq!(safe_next(Some("/\t/evil.example")), None);
        assert_eq!(safe_next(Some("https://evil.example")), None);
        assert_eq!(safe_next(None), None);
    }
}
