//! Movie listing, reviews and per-user hidden movies
//!
//! Review ownership is enforced here: an edit or delete by anyone but the
//! author answers exactly like a missing review, so the caller cannot tell
//! whether the review exists.

use crate::error::{CatalogError, CatalogResult};
use crate::models::{Identity, Movie, MovieId, NewMovie, Review, ReviewId, UserId};
use crate::store::{CatalogStore, Insert};
use crate::views::{HiddenMoviesView, MovieDetailView, MovieListView, ReviewEditView, ReviewView};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

/// Result of hiding a movie
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HideOutcome {
    Hidden(Movie),
    AlreadyHidden(Movie),
}

pub struct CatalogService<S> {
    store: Arc<S>,
}

impl<S> Clone for CatalogService<S> {
    fn clone(&self) -> Self {
        Self { store: self.store.clone() }
    }
}

impl<S: CatalogStore> CatalogService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Case-insensitive substring search on the name, minus the viewer's hidden movies
    pub async fn list(
        &self,
        search: Option<&str>,
        viewer: Option<&Identity>,
    ) -> CatalogResult<MovieListView> {
        let term = search.map(str::trim).filter(|t| !t.is_empty());
        let needle = term.map(str::to_lowercase);

        let hidden = match viewer {
            Some(user) => self.store.hidden_movie_ids(user.id).await?,
            None => Default::default(),
        };

        let movies = self
            .store
            .movies()
            .await?
            .into_iter()
            .filter(|m| !hidden.contains(&m.id))
            .filter(|m| match &needle {
                Some(needle) => m.name.to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .collect();

        Ok(MovieListView { search: term.map(str::to_string), movies })
    }

    pub async fn show(
        &self,
        movie_id: MovieId,
        viewer: Option<&Identity>,
    ) -> CatalogResult<MovieDetailView> {
        let movie = self.movie(movie_id).await?;
        let reviews = self.store.reviews_for_movie(movie_id).await?;
        let reviews = self.review_views(reviews, viewer).await?;
        let is_hidden = match viewer {
            Some(user) => self.store.hidden_movie_ids(user.id).await?.contains(&movie_id),
            None => false,
        };

        Ok(MovieDetailView { movie, reviews, is_hidden })
    }

    pub async fn create_review(
        &self,
        viewer: &Identity,
        movie_id: MovieId,
        comment: &str,
    ) -> CatalogResult<Review> {
        self.movie(movie_id).await?;
        let comment = non_empty_comment(comment)?;

        let review = self
            .store
            .add_review(movie_id, viewer.id, comment, Utc::now())
            .await?
            .ok_or(CatalogError::NotFound("Movie"))?;
        log::info!("Review {} posted on movie {} by {}", review.id, movie_id, viewer.username);
        Ok(review)
    }

    pub async fn review_for_edit(
        &self,
        viewer: &Identity,
        movie_id: MovieId,
        review_id: ReviewId,
    ) -> CatalogResult<ReviewEditView> {
        let movie = self.movie(movie_id).await?;
        let review = self.owned_review(viewer, movie_id, review_id).await?;

        Ok(ReviewEditView { movie, review: review_view(review, viewer.username.clone(), true) })
    }

    pub async fn edit_review(
        &self,
        viewer: &Identity,
        movie_id: MovieId,
        review_id: ReviewId,
        comment: &str,
    ) -> CatalogResult<Review> {
        self.owned_review(viewer, movie_id, review_id).await?;
        let comment = non_empty_comment(comment)?;

        self.store
            .update_review_comment(review_id, comment)
            .await?
            .ok_or(CatalogError::NotFound("Review"))
    }

    pub async fn delete_review(
        &self,
        viewer: &Identity,
        movie_id: MovieId,
        review_id: ReviewId,
    ) -> CatalogResult<Review> {
        self.owned_review(viewer, movie_id, review_id).await?;

        let review =
            self.store.delete_review(review_id).await?.ok_or(CatalogError::NotFound("Review"))?;
        log::info!("Review {} deleted by {}", review_id, viewer.username);
        Ok(review)
    }

    pub async fn hide(&self, viewer: &Identity, movie_id: MovieId) -> CatalogResult<HideOutcome> {
        let movie = self.movie(movie_id).await?;

        match self.store.hide_movie(viewer.id, movie_id).await? {
            Some(Insert::Created(_)) => Ok(HideOutcome::Hidden(movie)),
            Some(Insert::Existing(_)) => Ok(HideOutcome::AlreadyHidden(movie)),
            None => Err(CatalogError::NotFound("Movie")),
        }
    }

    /// Remove the viewer's marker; a movie that was never hidden is not-found
    pub async fn unhide(&self, viewer: &Identity, movie_id: MovieId) -> CatalogResult<MovieId> {
        self.store
            .unhide_movie(viewer.id, movie_id)
            .await?
            .map(|marker| marker.movie)
            .ok_or(CatalogError::NotFound("Hidden movie"))
    }

    pub async fn hidden(&self, viewer: &Identity) -> CatalogResult<HiddenMoviesView> {
        let ids = self.store.hidden_movie_ids(viewer.id).await?;
        let mut movies = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(movie) = self.store.movie(id).await? {
                movies.push(movie);
            }
        }
        Ok(HiddenMoviesView { movies })
    }

    pub async fn add_movie(&self, viewer: &Identity, movie: NewMovie) -> CatalogResult<Movie> {
        require_staff(viewer)?;

        let mut errors = Vec::new();
        if movie.name.trim().is_empty() {
            errors.push("Name is required".to_string());
        }
        if movie.price < 0 {
            errors.push("Price cannot be negative".to_string());
        }
        if !errors.is_empty() {
            return Err(CatalogError::Validation(errors));
        }

        let movie = self
            .store
            .add_movie(NewMovie {
                name: movie.name.trim().to_string(),
                description: movie.description.trim().to_string(),
                image: movie.image.trim().to_string(),
                price: movie.price,
            })
            .await?;
        log::info!("Movie {} '{}' added by {}", movie.id, movie.name, viewer.username);
        Ok(movie)
    }

    /// Remove a movie with its reviews and hidden markers
    pub async fn remove_movie(&self, viewer: &Identity, movie_id: MovieId) -> CatalogResult<Movie> {
        require_staff(viewer)?;

        let movie =
            self.store.remove_movie(movie_id).await?.ok_or(CatalogError::NotFound("Movie"))?;
        log::info!("Movie {} '{}' removed by {}", movie.id, movie.name, viewer.username);
        Ok(movie)
    }

    async fn movie(&self, id: MovieId) -> CatalogResult<Movie> {
        self.store.movie(id).await?.ok_or(CatalogError::NotFound("Movie"))
    }

    /// The review, if it belongs to `movie_id` and was written by `viewer`
    async fn owned_review(
        &self,
        viewer: &Identity,
        movie_id: MovieId,
        review_id: ReviewId,
    ) -> CatalogResult<Review> {
        match self.store.review(review_id).await? {
            Some(review) if review.movie == movie_id && review.user == viewer.id => Ok(review),
            Some(review) => {
                log::debug!(
                    "User {} denied access to review {} (movie {})",
                    viewer.username,
                    review.id,
                    review.movie
                );
                Err(CatalogError::NotFound("Review"))
            }
            None => Err(CatalogError::NotFound("Review")),
        }
    }

    async fn review_views(
        &self,
        reviews: Vec<Review>,
        viewer: Option<&Identity>,
    ) -> CatalogResult<Vec<ReviewView>> {
        let mut usernames: HashMap<UserId, String> = HashMap::new();
        let mut views = Vec::with_capacity(reviews.len());

        for review in reviews {
            if !usernames.contains_key(&review.user) {
                let name = self
                    .store
                    .user(review.user)
                    .await?
                    .map(|u| u.username)
                    .unwrap_or_else(|| format!("user-{}", review.user));
                usernames.insert(review.user, name);
            }
            let username = usernames.get(&review.user).cloned().unwrap_or_default();
            let is_owner = viewer.is_some_and(|v| v.id == review.user);
            views.push(review_view(review, username, is_owner));
        }

        Ok(views)
    }
}

pub(crate) fn require_staff(viewer: &Identity) -> CatalogResult<()> {
    if viewer.is_staff {
        Ok(())
    } else {
        log::warn!("User {} attempted a staff-only action", viewer.username);
        Err(CatalogError::Forbidden)
    }
}

fn non_empty_comment(comment: &str) -> CatalogResult<String> {
    let comment = comment.trim();
    if comment.is_empty() {
        return Err(CatalogError::validation("Review comment cannot be empty"));
    }
    Ok(comment.to_string())
}

fn review_view(review: Review, username: String, is_owner: bool) -> ReviewView {
    ReviewView {
        id: review.id,
        movie: review.movie,
        comment: review.comment,
        date: review.created_at,
        username,
        is_owner,
    }
}
