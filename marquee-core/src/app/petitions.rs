//! Petition pages and actions

use super::{id_param, App, Reply, Visit};
use crate::error::{CatalogError, CatalogResult};
use crate::http::RequestContext;
use crate::models::{PetitionId, PetitionStatus};
use crate::petitions::{DecideOutcome, UnvoteOutcome, VoteOutcome};
use crate::views::{FlashMessage, PetitionFormView};
use http::StatusCode;

const PETITIONS_PATH: &str = "/movies/petitions/";

impl App {
    pub(super) async fn petition_list(&self, visit: &Visit) -> CatalogResult<Reply> {
        let view = self.petitions.list_view(visit.identity.as_ref()).await?;
        Ok(Reply::page(&view))
    }

    pub(super) fn petition_form(&self) -> Reply {
        Reply::page(&PetitionFormView::default())
    }

    /// Invalid input re-renders the form (422) with the submitted values
    pub(super) async fn petition_create(
        &self,
        ctx: &RequestContext,
        visit: &mut Visit,
    ) -> CatalogResult<Reply> {
        let user = visit.user()?;
        let movie_title = ctx.field("movie_title");
        let description = ctx.field("description");

        match self.petitions.create(&user, movie_title, description).await {
            Ok(petition) => {
                self.flash(
                    visit,
                    FlashMessage::success(format!(
                        "Petition for '{}' created",
                        petition.movie_title
                    )),
                );
                Ok(Reply::redirect(PETITIONS_PATH))
            }
            Err(CatalogError::Validation(errors)) => Ok(Reply::page_with_status(
                StatusCode::UNPROCESSABLE_ENTITY,
                &PetitionFormView {
                    errors,
                    movie_title: movie_title.to_string(),
                    description: description.to_string(),
                },
            )),
            Err(e) => Err(e),
        }
    }

    pub(super) async fn petition_vote(
        &self,
        ctx: &RequestContext,
        visit: &mut Visit,
    ) -> CatalogResult<Reply> {
        let user = visit.user()?;
        let id: PetitionId = id_param(ctx, "id", "Petition")?;

        let message = match self.petitions.vote(&user, id).await? {
            VoteOutcome::Recorded => FlashMessage::success("Your vote has been recorded"),
            VoteOutcome::AlreadyVoted => {
                FlashMessage::info("You have already voted for this petition")
            }
            VoteOutcome::Closed(status) => {
                FlashMessage::info(format!("This petition was already {}", status))
            }
        };
        self.flash(visit, message);
        Ok(Reply::redirect(PETITIONS_PATH))
    }

    pub(super) async fn petition_unvote(
        &self,
        ctx: &RequestContext,
        visit: &mut Visit,
    ) -> CatalogResult<Reply> {
        let user = visit.user()?;
        let id: PetitionId = id_param(ctx, "id", "Petition")?;

        let message = match self.petitions.unvote(&user, id).await? {
            UnvoteOutcome::Withdrawn => FlashMessage::success("Your vote has been removed"),
            UnvoteOutcome::NotVoted => FlashMessage::info("You have not voted for this petition"),
            UnvoteOutcome::Closed(status) => {
                FlashMessage::info(format!("This petition was already {}", status))
            }
        };
        self.flash(visit, message);
        Ok(Reply::redirect(PETITIONS_PATH))
    }

    pub(super) async fn petition_decide(
        &self,
        ctx: &RequestContext,
        visit: &mut Visit,
        approve: bool,
    ) -> CatalogResult<Reply> {
        let user = visit.user()?;
        let id: PetitionId = id_param(ctx, "id", "Petition")?;
        let status = if approve { PetitionStatus::Approved } else { PetitionStatus::Rejected };

        let message = match self.petitions.decide(&user, id, status).await? {
            DecideOutcome::Decided(petition) => FlashMessage::success(format!(
                "Petition for '{}' {}",
                petition.movie_title, petition.status
            )),
            DecideOutcome::AlreadyDecided(petition) => FlashMessage::info(format!(
                "Petition for '{}' was already {}",
                petition.movie_title, petition.status
            )),
        };
        self.flash(visit, message);
        Ok(Reply::redirect(PETITIONS_PATH))
    }
}
