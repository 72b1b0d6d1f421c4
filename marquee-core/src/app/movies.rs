//! Catalog pages, hidden movies and staff movie administration

use super::{id_param, App, Reply, Visit};
use crate::catalog::HideOutcome;
use crate::error::{CatalogError, CatalogResult};
use crate::http::RequestContext;
use crate::models::{MovieId, NewMovie};
use crate::store::MovieRepository;
use crate::views::FlashMessage;
use http::StatusCode;
use serde_json::json;

impl App {
    pub(super) async fn movie_list(
        &self,
        ctx: &RequestContext,
        visit: &Visit,
    ) -> CatalogResult<Reply> {
        let view = self.catalog.list(ctx.query_param("search"), visit.identity.as_ref()).await?;
        Ok(Reply::page(&view))
    }

    pub(super) async fn movie_detail(
        &self,
        ctx: &RequestContext,
        visit: &Visit,
    ) -> CatalogResult<Reply> {
        let movie_id: MovieId = id_param(ctx, "id", "Movie")?;
        let view = self.catalog.show(movie_id, visit.identity.as_ref()).await?;
        Ok(Reply::page(&view))
    }

    pub(super) async fn hidden_list(&self, visit: &Visit) -> CatalogResult<Reply> {
        let view = self.catalog.hidden(&visit.user()?).await?;
        Ok(Reply::page(&view))
    }

    pub(super) async fn hide_movie(
        &self,
        ctx: &RequestContext,
        visit: &mut Visit,
    ) -> CatalogResult<Reply> {
        let user = visit.user()?;
        let movie_id: MovieId = id_param(ctx, "id", "Movie")?;

        let message = match self.catalog.hide(&user, movie_id).await? {
            HideOutcome::Hidden(movie) => {
                FlashMessage::success(format!("'{}' has been hidden", movie.name))
            }
            HideOutcome::AlreadyHidden(movie) => {
                FlashMessage::info(format!("'{}' is already hidden", movie.name))
            }
        };
        self.flash(visit, message);
        Ok(Reply::redirect("/movies/"))
    }

    pub(super) async fn unhide_movie(
        &self,
        ctx: &RequestContext,
        visit: &mut Visit,
    ) -> CatalogResult<Reply> {
        let user = visit.user()?;
        let movie_id: MovieId = id_param(ctx, "id", "Movie")?;

        self.catalog.unhide(&user, movie_id).await?;
        let text = match self.store.movie(movie_id).await? {
            Some(movie) => format!("'{}' is visible again", movie.name),
            None => "Movie is visible again".to_string(),
        };
        self.flash(visit, FlashMessage::success(text));
        Ok(Reply::redirect("/movies/hidden/"))
    }

    /// Staff JSON endpoint; answers 201 with the stored movie
    pub(super) async fn admin_add_movie(
        &self,
        ctx: &RequestContext,
        visit: &Visit,
    ) -> CatalogResult<Reply> {
        let user = visit.user()?;
        let price = ctx.field("price").trim();
        let price = price
            .parse::<i64>()
            .map_err(|_| CatalogError::validation(format!("Invalid price '{}'", price)))?;

        let movie = self
            .catalog
            .add_movie(
                &user,
                NewMovie {
                    name: ctx.field("name").to_string(),
                    price,
                    description: ctx.field("description").to_string(),
                    image: ctx.field("image").to_string(),
                },
            )
            .await?;
        Ok(Reply::page_with_status(StatusCode::CREATED, &movie))
    }

    pub(super) async fn admin_remove_movie(
        &self,
        ctx: &RequestContext,
        visit: &Visit,
    ) -> CatalogResult<Reply> {
        let user = visit.user()?;
        let movie_id: MovieId = id_param(ctx, "id", "Movie")?;

        let movie = self.catalog.remove_movie(&user, movie_id).await?;
        Ok(Reply::page(&json!({ "removed": movie })))
    }
}
