//! Movie petitions: filing, voting, ranking and staff decisions

use crate::catalog::require_staff;
use crate::error::{CatalogError, CatalogResult};
use crate::models::{Identity, MoviePetition, PetitionId, PetitionStatus, UserId};
use crate::store::{CatalogStore, Insert, PetitionDecision, VoteWrite};
use crate::views::{PetitionListView, PetitionView};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A pending petition with its tally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedPetition {
    pub petition: MoviePetition,
    pub vote_count: usize,
    pub user_has_voted: bool,
}

/// Annotate petitions with vote counts and sort by count, highest first
///
/// `petitions` must already be in retrieval order (newest first); the sort
/// is stable, so petitions with equal counts keep that order.
pub fn rank(
    petitions: Vec<MoviePetition>,
    counts: &HashMap<PetitionId, usize>,
    voted: &HashSet<PetitionId>,
) -> Vec<RankedPetition> {
    let mut ranked: Vec<RankedPetition> = petitions
        .into_iter()
        .map(|petition| RankedPetition {
            vote_count: counts.get(&petition.id).copied().unwrap_or(0),
            user_has_voted: voted.contains(&petition.id),
            petition,
        })
        .collect();
    ranked.sort_by(|a, b| b.vote_count.cmp(&a.vote_count));
    ranked
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Recorded,
    AlreadyVoted,
    /// The petition was approved or rejected; votes are frozen
    Closed(PetitionStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnvoteOutcome {
    Withdrawn,
    NotVoted,
    Closed(PetitionStatus),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecideOutcome {
    Decided(MoviePetition),
    AlreadyDecided(MoviePetition),
}

pub struct PetitionService<S> {
    store: Arc<S>,
}

impl<S> Clone for PetitionService<S> {
    fn clone(&self) -> Self {
        Self { store: self.store.clone() }
    }
}

impl<S: CatalogStore> PetitionService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Pending petitions ranked by votes, annotated for `viewer`
    pub async fn ranked(&self, viewer: Option<&Identity>) -> CatalogResult<Vec<RankedPetition>> {
        let petitions = self.store.petitions_with_status(PetitionStatus::Pending).await?;
        let counts = self.store.vote_counts().await?;
        let voted = match viewer {
            Some(user) => self.store.voted_petitions(user.id).await?,
            None => HashSet::new(),
        };
        Ok(rank(petitions, &counts, &voted))
    }

    pub async fn list_view(&self, viewer: Option<&Identity>) -> CatalogResult<PetitionListView> {
        let ranked = self.ranked(viewer).await?;
        let mut usernames: HashMap<UserId, String> = HashMap::new();
        let mut petitions = Vec::with_capacity(ranked.len());

        for entry in ranked {
            let petitioner = entry.petition.petitioner;
            if !usernames.contains_key(&petitioner) {
                let name = self
                    .store
                    .user(petitioner)
                    .await?
                    .map(|u| u.username)
                    .unwrap_or_else(|| format!("user-{}", petitioner));
                usernames.insert(petitioner, name);
            }
            petitions.push(PetitionView {
                id: entry.petition.id,
                movie_title: entry.petition.movie_title,
                description: entry.petition.description,
                petitioner: usernames.get(&petitioner).cloned().unwrap_or_default(),
                created_at: entry.petition.created_at,
                status: entry.petition.status,
                vote_count: entry.vote_count,
                user_has_voted: entry.user_has_voted,
            });
        }

        Ok(PetitionListView { petitions })
    }

    /// File a petition; both fields must be non-empty after trimming
    pub async fn create(
        &self,
        viewer: &Identity,
        movie_title: &str,
        description: &str,
    ) -> CatalogResult<MoviePetition> {
        let movie_title = movie_title.trim();
        let description = description.trim();

        let mut errors = Vec::new();
        if movie_title.is_empty() {
            errors.push("Movie title is required".to_string());
        }
        if description.is_empty() {
            errors.push("Please explain why this movie should be added".to_string());
        }
        if !errors.is_empty() {
            return Err(CatalogError::Validation(errors));
        }

        let petition = self
            .store
            .add_petition(movie_title.to_string(), description.to_string(), viewer.id, Utc::now())
            .await?;
        log::info!("Petition {} '{}' filed by {}", petition.id, petition.movie_title, viewer.username);
        Ok(petition)
    }

    /// The pending check happens in the store, atomically with the write
    pub async fn vote(&self, viewer: &Identity, id: PetitionId) -> CatalogResult<VoteOutcome> {
        match self.store.cast_vote(id, viewer.id, Utc::now()).await? {
            VoteWrite::Applied(Insert::Created(_)) => Ok(VoteOutcome::Recorded),
            VoteWrite::Applied(Insert::Existing(_)) => Ok(VoteOutcome::AlreadyVoted),
            VoteWrite::Closed(status) => Ok(VoteOutcome::Closed(status)),
            VoteWrite::NoPetition => Err(CatalogError::NotFound("Petition")),
        }
    }

    pub async fn unvote(&self, viewer: &Identity, id: PetitionId) -> CatalogResult<UnvoteOutcome> {
        match self.store.withdraw_vote(id, viewer.id).await? {
            VoteWrite::Applied(Some(_)) => Ok(UnvoteOutcome::Withdrawn),
            VoteWrite::Applied(None) => Ok(UnvoteOutcome::NotVoted),
            VoteWrite::Closed(status) => Ok(UnvoteOutcome::Closed(status)),
            VoteWrite::NoPetition => Err(CatalogError::NotFound("Petition")),
        }
    }

    /// Approve or reject a pending petition (staff only)
    pub async fn decide(
        &self,
        viewer: &Identity,
        id: PetitionId,
        status: PetitionStatus,
    ) -> CatalogResult<DecideOutcome> {
        require_staff(viewer)?;
        if status.is_pending() {
            return Err(CatalogError::validation("A decision must approve or reject"));
        }

        match self.store.decide_petition(id, status).await? {
            PetitionDecision::Decided(petition) => {
                log::info!("Petition {} {} by {}", petition.id, petition.status, viewer.username);
                Ok(DecideOutcome::Decided(petition))
            }
            PetitionDecision::AlreadyDecided(petition) => Ok(DecideOutcome::AlreadyDecided(petition)),
            PetitionDecision::NotFound => Err(CatalogError::NotFound("Petition")),
        }
    }
}
