//! Per-entity repository traits
//!
//! Services are generic over these traits; [`super::Store`] implements all
//! of them. Listing methods return rows in the order callers rely on.

use super::StoreResult;
use crate::models::{
    HiddenMovie, Movie, MovieId, MoviePetition, NewMovie, PetitionId, PetitionStatus,
    PetitionVote, Review, ReviewId, User, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Result of an insert-if-absent on a uniqueness-constrained table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insert<T> {
    Created(T),
    /// The key was taken; carries the row that holds it
    Existing(T),
}

impl<T> Insert<T> {
    pub fn is_created(&self) -> bool {
        matches!(self, Insert::Created(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Insert::Created(row) | Insert::Existing(row) => row,
        }
    }
}

/// Result of moving a petition out of `Pending`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PetitionDecision {
    Decided(MoviePetition),
    AlreadyDecided(MoviePetition),
    NotFound,
}

/// Result of a vote write, checked against the petition under the journal lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteWrite<T> {
    Applied(T),
    /// The petition was decided; votes are frozen
    Closed(PetitionStatus),
    NoPetition,
}

#[async_trait]
pub trait MovieRepository: Send + Sync {
    async fn movie(&self, id: MovieId) -> StoreResult<Option<Movie>>;

    /// All movies, id ascending
    async fn movies(&self) -> StoreResult<Vec<Movie>>;

    async fn add_movie(&self, movie: NewMovie) -> StoreResult<Movie>;

    /// Removes the movie together with its reviews and hidden markers
    async fn remove_movie(&self, id: MovieId) -> StoreResult<Option<Movie>>;
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn review(&self, id: ReviewId) -> StoreResult<Option<Review>>;

    /// Reviews of one movie, id ascending
    async fn reviews_for_movie(&self, movie: MovieId) -> StoreResult<Vec<Review>>;

    /// `None` when the movie does not exist
    async fn add_review(
        &self,
        movie: MovieId,
        user: UserId,
        comment: String,
        created_at: DateTime<Utc>,
    ) -> StoreResult<Option<Review>>;

    async fn update_review_comment(
        &self,
        id: ReviewId,
        comment: String,
    ) -> StoreResult<Option<Review>>;

    async fn delete_review(&self, id: ReviewId) -> StoreResult<Option<Review>>;
}

#[async_trait]
pub trait HiddenMovieRepository: Send + Sync {
    /// Get-or-create the `(user, movie)` marker; `None` when the movie does not exist
    async fn hide_movie(
        &self,
        user: UserId,
        movie: MovieId,
    ) -> StoreResult<Option<Insert<HiddenMovie>>>;

    async fn unhide_movie(&self, user: UserId, movie: MovieId) -> StoreResult<Option<HiddenMovie>>;

    async fn hidden_movie_ids(&self, user: UserId) -> StoreResult<BTreeSet<MovieId>>;
}

#[async_trait]
pub trait PetitionRepository: Send + Sync {
    async fn petition(&self, id: PetitionId) -> StoreResult<Option<MoviePetition>>;

    /// Petitions in `status`, newest first (ties broken by id descending)
    async fn petitions_with_status(&self, status: PetitionStatus)
        -> StoreResult<Vec<MoviePetition>>;

    async fn add_petition(
        &self,
        movie_title: String,
        description: String,
        petitioner: UserId,
        created_at: DateTime<Utc>,
    ) -> StoreResult<MoviePetition>;

    /// Moves a pending petition to `status`; decided petitions are left alone
    async fn decide_petition(
        &self,
        id: PetitionId,
        status: PetitionStatus,
    ) -> StoreResult<PetitionDecision>;

    /// Removes the petition together with its votes
    async fn remove_petition(&self, id: PetitionId) -> StoreResult<Option<MoviePetition>>;
}

#[async_trait]
pub trait VoteRepository: Send + Sync {
    /// Insert-if-absent on `(petition, user)`; only pending petitions take votes
    async fn cast_vote(
        &self,
        petition: PetitionId,
        user: UserId,
        voted_at: DateTime<Utc>,
    ) -> StoreResult<VoteWrite<Insert<PetitionVote>>>;

    /// Removes the `(petition, user)` vote if the petition is still pending
    async fn withdraw_vote(
        &self,
        petition: PetitionId,
        user: UserId,
    ) -> StoreResult<VoteWrite<Option<PetitionVote>>>;

    /// Number of vote rows per petition; petitions without votes are absent
    async fn vote_counts(&self) -> StoreResult<HashMap<PetitionId, usize>>;

    async fn voted_petitions(&self, user: UserId) -> StoreResult<HashSet<PetitionId>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn user(&self, id: UserId) -> StoreResult<Option<User>>;

    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// Insert-if-absent on the username
    async fn register_user(
        &self,
        username: String,
        password_hash: String,
        is_staff: bool,
    ) -> StoreResult<Insert<User>>;
}

/// Everything the application needs from storage
pub trait CatalogStore:
    MovieRepository
    + ReviewRepository
    + HiddenMovieRepository
    + PetitionRepository
    + VoteRepository
    + UserRepository
{
}

impl<T> CatalogStore for T where
    T: MovieRepository
        + ReviewRepository
        + HiddenMovieRepository
        + PetitionRepository
        + VoteRepository
        + UserRepository
{
}
