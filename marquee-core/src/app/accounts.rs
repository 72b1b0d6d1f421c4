//! Signup, login and logout

use super::{safe_next, App, Reply, Visit};
use crate::error::CatalogResult;
use crate::http::RequestContext;
use crate::models::User;
use crate::views::{AccountView, FlashMessage, LoginFormView};
use http::StatusCode;

fn account_view(user: &User, token: String) -> AccountView {
    AccountView { username: user.username.clone(), is_staff: user.is_staff, token }
}

impl App {
    /// Creates the account and logs it in (201)
    pub(super) async fn signup(
        &self,
        ctx: &RequestContext,
        visit: &mut Visit,
    ) -> CatalogResult<Reply> {
        let user = self.accounts.signup(ctx.field("username"), ctx.field("password")).await?;
        let token = self.start_session(visit, &user).await;
        self.flash(visit, FlashMessage::success(format!("Welcome, {}", user.username)));
        Ok(Reply::page_with_status(StatusCode::CREATED, &account_view(&user, token)))
    }

    pub(super) fn login_form(&self, ctx: &RequestContext) -> Reply {
        Reply::page(&LoginFormView {
            next: safe_next(ctx.query_param("next")),
            fields: vec!["username".to_string(), "password".to_string()],
        })
    }

    /// Answers with the account and token, or follows a same-site `next`
    pub(super) async fn login(
        &self,
        ctx: &RequestContext,
        visit: &mut Visit,
    ) -> CatalogResult<Reply> {
        let user = self.accounts.login(ctx.field("username"), ctx.field("password")).await?;
        let token = self.start_session(visit, &user).await;
        log::info!("{} logged in", user.username);

        let next = ctx.form.get("next").map(String::as_str).or_else(|| ctx.query_param("next"));
        match safe_next(next) {
            Some(location) => Ok(Reply::redirect(location)),
            None => Ok(Reply::page(&account_view(&user, token))),
        }
    }

    pub(super) async fn logout(&self, visit: &mut Visit) -> CatalogResult<Reply> {
        if let Some(user) = &visit.identity {
            log::info!("{} logged out", user.username);
        }
        self.end_session(visit).await;
        Ok(Reply::redirect("/movies/"))
    }
}
