//! Review create, edit and delete
//!
//! An empty comment does not get a 422 here: the error is flashed and the
//! user lands back on the movie page with nothing persisted.

use super::{id_param, App, Reply, Visit};
use crate::error::{CatalogError, CatalogResult};
use crate::http::RequestContext;
use crate::models::{MovieId, ReviewId};
use crate::views::FlashMessage;

fn movie_path(movie_id: MovieId) -> String {
    format!("/movies/{}/", movie_id)
}

impl App {
    pub(super) async fn review_create(
        &self,
        ctx: &RequestContext,
        visit: &mut Visit,
    ) -> CatalogResult<Reply> {
        let user = visit.user()?;
        let movie_id: MovieId = id_param(ctx, "id", "Movie")?;

        let message = match self.catalog.create_review(&user, movie_id, ctx.field("comment")).await {
            Ok(_) => FlashMessage::success("Review posted"),
            Err(CatalogError::Validation(errors)) => FlashMessage::error(errors.join("; ")),
            Err(e) => return Err(e),
        };
        self.flash(visit, message);
        Ok(Reply::redirect(movie_path(movie_id)))
    }

    pub(super) async fn review_edit_form(
        &self,
        ctx: &RequestContext,
        visit: &Visit,
    ) -> CatalogResult<Reply> {
        let user = visit.user()?;
        let movie_id: MovieId = id_param(ctx, "id", "Movie")?;
        let review_id: ReviewId = id_param(ctx, "review_id", "Review")?;

        let view = self.catalog.review_for_edit(&user, movie_id, review_id).await?;
        Ok(Reply::page(&view))
    }

    pub(super) async fn review_edit_submit(
        &self,
        ctx: &RequestContext,
        visit: &mut Visit,
    ) -> CatalogResult<Reply> {
        let user = visit.user()?;
        let movie_id: MovieId = id_param(ctx, "id", "Movie")?;
        let review_id: ReviewId = id_param(ctx, "review_id", "Review")?;

        let message =
            match self.catalog.edit_review(&user, movie_id, review_id, ctx.field("comment")).await {
                Ok(_) => FlashMessage::success("Review updated"),
                Err(CatalogError::Validation(errors)) => FlashMessage::error(errors.join("; ")),
                Err(e) => return Err(e),
            };
        self.flash(visit, message);
        Ok(Reply::redirect(movie_path(movie_id)))
    }

    pub(super) async fn review_delete(
        &self,
        ctx: &RequestContext,
        visit: &mut Visit,
    ) -> CatalogResult<Reply> {
        let user = visit.user()?;
        let movie_id: MovieId = id_param(ctx, "id", "Movie")?;
        let review_id: ReviewId = id_param(ctx, "review_id", "Review")?;

        self.catalog.delete_review(&user, movie_id, review_id).await?;
        self.flash(visit, FlashMessage::success("Review deleted"));
        Ok(Reply::redirect(movie_path(movie_id)))
    }
}
