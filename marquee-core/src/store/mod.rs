//! Journal-backed catalog store
//!
//! Tables live in `scc::HashMap`s so reads never block each other or the
//! writer. Every mutation goes through the journal lock: the event is
//! appended to the journal first and applied to the tables afterwards, so
//! the journal order is the apply order and a failed append leaves the
//! tables untouched.
//!
//! Uniqueness-constrained tables (`hidden`, `votes`, `usernames`) key on the
//! constrained tuple and insert through a vacant entry, which makes the
//! insert-if-absent atomic even without the journal lock.
//!
//! Writes that reference a parent row (reviews, hidden markers, votes) check
//! the parent while holding the journal lock, so a concurrent cascade delete
//! cannot leave orphans behind.

mod events;
mod journal;
mod repository;

pub use events::StoreEvent;
pub use journal::{
    calculate_crc32, format_line_with_crc32, parse_and_validate_line, EventEnvelope, Journal,
    JournalReport, JOURNAL_FILE,
};
pub use repository::{
    CatalogStore, HiddenMovieRepository, Insert, MovieRepository, PetitionDecision,
    PetitionRepository, ReviewRepository, UserRepository, VoteRepository, VoteWrite,
};

use crate::config::StorageConfig;
use crate::models::{
    HiddenMovie, HiddenMovieId, Movie, MovieId, MoviePetition, NewMovie, PetitionId,
    PetitionStatus, PetitionVote, Review, ReviewId, User, UserId, VoteId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scc::hash_map::Entry;
use scc::HashMap as SccHashMap;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Storage failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Journal corrupted at line {line}: {reason}")]
    Corrupted { line: usize, reason: String },
    #[error("Cannot replay event {event_id}: {reason}")]
    Replay { event_id: String, reason: String },
    #[error("Conflicting state: {0}")]
    Conflict(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Row counts for the health endpoint and startup logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    pub movies: usize,
    pub reviews: usize,
    pub hidden: usize,
    pub petitions: usize,
    pub votes: usize,
    pub users: usize,
}

#[derive(Default)]
struct Sequences {
    movie: AtomicU64,
    review: AtomicU64,
    hidden: AtomicU64,
    petition: AtomicU64,
    vote: AtomicU64,
    user: AtomicU64,
}

impl Sequences {
    fn next(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn observe(counter: &AtomicU64, id: u64) {
        counter.fetch_max(id, Ordering::SeqCst);
    }
}

pub struct Store {
    movies: SccHashMap<MovieId, Movie>,
    reviews: SccHashMap<ReviewId, Review>,
    hidden: SccHashMap<(UserId, MovieId), HiddenMovie>,
    petitions: SccHashMap<PetitionId, MoviePetition>,
    votes: SccHashMap<(PetitionId, UserId), PetitionVote>,
    users: SccHashMap<UserId, User>,
    usernames: SccHashMap<String, UserId>,
    seq: Sequences,
    journal: Mutex<Journal>,
}

impl Store {
    fn with_journal(journal: Journal) -> Self {
        Self {
            movies: SccHashMap::new(),
            reviews: SccHashMap::new(),
            hidden: SccHashMap::new(),
            petitions: SccHashMap::new(),
            votes: SccHashMap::new(),
            users: SccHashMap::new(),
            usernames: SccHashMap::new(),
            seq: Sequences::default(),
            journal: Mutex::new(journal),
        }
    }

    /// Store without a journal file; everything is lost on drop
    pub fn in_memory() -> Self {
        Self::with_journal(Journal::in_memory())
    }

    /// Open the store described by `config`, replaying its journal
    pub fn open(config: &StorageConfig) -> StoreResult<Self> {
        if config.in_memory {
            log::info!("Store running in memory, nothing will be persisted");
            return Ok(Self::in_memory());
        }

        let start = std::time::Instant::now();
        let (journal, envelopes) = Journal::open(&config.data_dir, config.fsync)?;
        let store = Self::with_journal(journal);

        for envelope in &envelopes {
            let event: StoreEvent = serde_json::from_str(&envelope.payload).map_err(|e| {
                StoreError::Replay { event_id: envelope.event_id.clone(), reason: e.to_string() }
            })?;
            store.apply(&event);
        }

        log::info!(
            "Replayed {} events from {} in {:?}",
            envelopes.len(),
            config.data_dir.display(),
            start.elapsed()
        );
        Ok(store)
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            movies: self.movies.len(),
            reviews: self.reviews.len(),
            hidden: self.hidden.len(),
            petitions: self.petitions.len(),
            votes: self.votes.len(),
            users: self.users.len(),
        }
    }

    /// Number of events written since the store was opened
    pub async fn journal_appended(&self) -> u64 {
        self.journal.lock().await.appended()
    }

    /// `Some` when votes on `petition` must be refused; call with the journal lock held
    async fn closed_status<T>(&self, petition: PetitionId) -> Option<VoteWrite<T>> {
        match self.petitions.read_async(&petition, |_, p| p.status).await {
            None => Some(VoteWrite::NoPetition),
            Some(status) if !status.is_pending() => Some(VoteWrite::Closed(status)),
            Some(_) => None,
        }
    }

    /// Apply an already journaled event to the tables
    fn apply(&self, event: &StoreEvent) {
        match event {
            StoreEvent::MovieAdded(movie) => {
                Sequences::observe(&self.seq.movie, movie.id.0);
                upsert(&self.movies, movie.id, movie.clone());
            }
            StoreEvent::MovieRemoved { id } => {
                self.movies.remove_sync(id);
                self.reviews.retain_sync(|_, review| review.movie != *id);
                self.hidden.retain_sync(|key, _| key.1 != *id);
            }
            StoreEvent::ReviewPosted(review) => {
                Sequences::observe(&self.seq.review, review.id.0);
                upsert(&self.reviews, review.id, review.clone());
            }
            StoreEvent::ReviewEdited { id, comment } => {
                if let Entry::Occupied(mut o) = self.reviews.entry_sync(*id) {
                    o.get_mut().comment = comment.clone();
                }
            }
            StoreEvent::ReviewDeleted { id } => {
                self.reviews.remove_sync(id);
            }
            StoreEvent::MovieHidden(marker) => {
                Sequences::observe(&self.seq.hidden, marker.id.0);
                upsert(&self.hidden, (marker.user, marker.movie), marker.clone());
            }
            StoreEvent::MovieUnhidden { user, movie } => {
                self.hidden.remove_sync(&(*user, *movie));
            }
            StoreEvent::PetitionFiled(petition) => {
                Sequences::observe(&self.seq.petition, petition.id.0);
                upsert(&self.petitions, petition.id, petition.clone());
            }
            StoreEvent::PetitionDecided { id, status } => {
                if let Entry::Occupied(mut o) = self.petitions.entry_sync(*id) {
                    o.get_mut().status = *status;
                }
            }
            StoreEvent::PetitionRemoved { id } => {
                self.petitions.remove_sync(id);
                self.votes.retain_sync(|key, _| key.0 != *id);
            }
            StoreEvent::VoteCast(vote) => {
                Sequences::observe(&self.seq.vote, vote.id.0);
                upsert(&self.votes, (vote.petition, vote.user), vote.clone());
            }
            StoreEvent::VoteWithdrawn { petition, user } => {
                self.votes.remove_sync(&(*petition, *user));
            }
            StoreEvent::UserRegistered(user) => {
                Sequences::observe(&self.seq.user, user.id.0);
                upsert(&self.usernames, user.username.clone(), user.id);
                upsert(&self.users, user.id, user.clone());
            }
        }
    }
}

fn record(journal: &mut Journal, event: &StoreEvent) -> StoreResult<()> {
    journal.append(event.event_type(), Some(event.aggregate_id()), event)
}

fn upsert<K: Eq + Hash, V>(map: &SccHashMap<K, V>, key: K, value: V) {
    match map.entry_sync(key) {
        Entry::Occupied(mut o) => *o.get_mut() = value,
        Entry::Vacant(v) => {
            v.insert_entry(value);
        }
    }
}

async fn rows<K: Eq + Hash, V: Clone>(map: &SccHashMap<K, V>) -> Vec<V> {
    let mut rows = Vec::with_capacity(map.len());
    map.retain_async(|_, v| {
        rows.push(v.clone());
        true
    })
    .await;
    rows
}

#[async_trait]
impl MovieRepository for Store {
    async fn movie(&self, id: MovieId) -> StoreResult<Option<Movie>> {
        Ok(self.movies.read_async(&id, |_, v| v.clone()).await)
    }

    async fn movies(&self) -> StoreResult<Vec<Movie>> {
        let mut movies = rows(&self.movies).await;
        movies.sort_by_key(|m| m.id);
        Ok(movies)
    }

    async fn add_movie(&self, movie: NewMovie) -> StoreResult<Movie> {
        let mut journal = self.journal.lock().await;
        let movie = Movie {
            id: MovieId(Sequences::next(&self.seq.movie)),
            name: movie.name,
            price: movie.price,
            description: movie.description,
            image: movie.image,
        };
        let event = StoreEvent::MovieAdded(movie.clone());
        record(&mut journal, &event)?;
        self.apply(&event);
        Ok(movie)
    }

    async fn remove_movie(&self, id: MovieId) -> StoreResult<Option<Movie>> {
        let mut journal = self.journal.lock().await;
        let Some(movie) = self.movies.read_async(&id, |_, v| v.clone()).await else {
            return Ok(None);
        };
        let event = StoreEvent::MovieRemoved { id };
        record(&mut journal, &event)?;
        self.apply(&event);
        Ok(Some(movie))
    }
}

#[async_trait]
impl ReviewRepository for Store {
    async fn review(&self, id: ReviewId) -> StoreResult<Option<Review>> {
        Ok(self.reviews.read_async(&id, |_, v| v.clone()).await)
    }

    async fn reviews_for_movie(&self, movie: MovieId) -> StoreResult<Vec<Review>> {
        let mut reviews: Vec<Review> =
            rows(&self.reviews).await.into_iter().filter(|r| r.movie == movie).collect();
        reviews.sort_by_key(|r| r.id);
        Ok(reviews)
    }

    async fn add_review(
        &self,
        movie: MovieId,
        user: UserId,
        comment: String,
        created_at: DateTime<Utc>,
    ) -> StoreResult<Option<Review>> {
        let mut journal = self.journal.lock().await;
        if !self.movies.contains_async(&movie).await {
            return Ok(None);
        }
        let review = Review {
            id: ReviewId(Sequences::next(&self.seq.review)),
            comment,
            created_at,
            movie,
            user,
        };
        let event = StoreEvent::ReviewPosted(review.clone());
        record(&mut journal, &event)?;
        self.apply(&event);
        Ok(Some(review))
    }

    async fn update_review_comment(
        &self,
        id: ReviewId,
        comment: String,
    ) -> StoreResult<Option<Review>> {
        let mut journal = self.journal.lock().await;
        let Some(mut review) = self.reviews.read_async(&id, |_, v| v.clone()).await else {
            return Ok(None);
        };
        let event = StoreEvent::ReviewEdited { id, comment: comment.clone() };
        record(&mut journal, &event)?;
        self.apply(&event);
        review.comment = comment;
        Ok(Some(review))
    }

    async fn delete_review(&self, id: ReviewId) -> StoreResult<Option<Review>> {
        let mut journal = self.journal.lock().await;
        let Some(review) = self.reviews.read_async(&id, |_, v| v.clone()).await else {
            return Ok(None);
        };
        let event = StoreEvent::ReviewDeleted { id };
        record(&mut journal, &event)?;
        self.apply(&event);
        Ok(Some(review))
    }
}

#[async_trait]
impl HiddenMovieRepository for Store {
    async fn hide_movie(
        &self,
        user: UserId,
        movie: MovieId,
    ) -> StoreResult<Option<Insert<HiddenMovie>>> {
        let mut journal = self.journal.lock().await;
        if !self.movies.contains_async(&movie).await {
            return Ok(None);
        }
        match self.hidden.entry_async((user, movie)).await {
            Entry::Occupied(o) => Ok(Some(Insert::Existing(o.get().clone()))),
            Entry::Vacant(v) => {
                let marker =
                    HiddenMovie { id: HiddenMovieId(Sequences::next(&self.seq.hidden)), movie, user };
                record(&mut journal, &StoreEvent::MovieHidden(marker.clone()))?;
                v.insert_entry(marker.clone());
                Ok(Some(Insert::Created(marker)))
            }
        }
    }

    async fn unhide_movie(&self, user: UserId, movie: MovieId) -> StoreResult<Option<HiddenMovie>> {
        let mut journal = self.journal.lock().await;
        let Some(marker) = self.hidden.read_async(&(user, movie), |_, v| v.clone()).await else {
            return Ok(None);
        };
        let event = StoreEvent::MovieUnhidden { user, movie };
        record(&mut journal, &event)?;
        self.apply(&event);
        Ok(Some(marker))
    }

    async fn hidden_movie_ids(&self, user: UserId) -> StoreResult<BTreeSet<MovieId>> {
        let mut ids = BTreeSet::new();
        self.hidden
            .retain_async(|key, _| {
                if key.0 == user {
                    ids.insert(key.1);
                }
                true
            })
            .await;
        Ok(ids)
    }
}

#[async_trait]
impl PetitionRepository for Store {
    async fn petition(&self, id: PetitionId) -> StoreResult<Option<MoviePetition>> {
        Ok(self.petitions.read_async(&id, |_, v| v.clone()).await)
    }

    async fn petitions_with_status(
        &self,
        status: PetitionStatus,
    ) -> StoreResult<Vec<MoviePetition>> {
        let mut petitions: Vec<MoviePetition> =
            rows(&self.petitions).await.into_iter().filter(|p| p.status == status).collect();
        petitions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(petitions)
    }

    async fn add_petition(
        &self,
        movie_title: String,
        description: String,
        petitioner: UserId,
        created_at: DateTime<Utc>,
    ) -> StoreResult<MoviePetition> {
        let mut journal = self.journal.lock().await;
        let petition = MoviePetition {
            id: PetitionId(Sequences::next(&self.seq.petition)),
            movie_title,
            description,
            petitioner,
            created_at,
            status: PetitionStatus::Pending,
        };
        let event = StoreEvent::PetitionFiled(petition.clone());
        record(&mut journal, &event)?;
        self.apply(&event);
        Ok(petition)
    }

    async fn decide_petition(
        &self,
        id: PetitionId,
        status: PetitionStatus,
    ) -> StoreResult<PetitionDecision> {
        let mut journal = self.journal.lock().await;
        match self.petitions.entry_async(id).await {
            Entry::Vacant(_) => Ok(PetitionDecision::NotFound),
            Entry::Occupied(mut o) => {
                if !o.get().status.is_pending() {
                    return Ok(PetitionDecision::AlreadyDecided(o.get().clone()));
                }
                record(&mut journal, &StoreEvent::PetitionDecided { id, status })?;
                o.get_mut().status = status;
                Ok(PetitionDecision::Decided(o.get().clone()))
            }
        }
    }

    async fn remove_petition(&self, id: PetitionId) -> StoreResult<Option<MoviePetition>> {
        let mut journal = self.journal.lock().await;
        let Some(petition) = self.petitions.read_async(&id, |_, v| v.clone()).await else {
            return Ok(None);
        };
        let event = StoreEvent::PetitionRemoved { id };
        record(&mut journal, &event)?;
        self.apply(&event);
        Ok(Some(petition))
    }
}

#[async_trait]
impl VoteRepository for Store {
    async fn cast_vote(
        &self,
        petition: PetitionId,
        user: UserId,
        voted_at: DateTime<Utc>,
    ) -> StoreResult<VoteWrite<Insert<PetitionVote>>> {
        let mut journal = self.journal.lock().await;
        if let Some(closed) = self.closed_status(petition).await {
            return Ok(closed);
        }
        match self.votes.entry_async((petition, user)).await {
            Entry::Occupied(o) => Ok(VoteWrite::Applied(Insert::Existing(o.get().clone()))),
            Entry::Vacant(v) => {
                let vote =
                    PetitionVote { id: VoteId(Sequences::next(&self.seq.vote)), petition, user, voted_at };
                record(&mut journal, &StoreEvent::VoteCast(vote.clone()))?;
                v.insert_entry(vote.clone());
                Ok(VoteWrite::Applied(Insert::Created(vote)))
            }
        }
    }

    async fn withdraw_vote(
        &self,
        petition: PetitionId,
        user: UserId,
    ) -> StoreResult<VoteWrite<Option<PetitionVote>>> {
        let mut journal = self.journal.lock().await;
        if let Some(closed) = self.closed_status(petition).await {
            return Ok(closed);
        }
        let Some(vote) = self.votes.read_async(&(petition, user), |_, v| v.clone()).await else {
            return Ok(VoteWrite::Applied(None));
        };
        let event = StoreEvent::VoteWithdrawn { petition, user };
        record(&mut journal, &event)?;
        self.apply(&event);
        Ok(VoteWrite::Applied(Some(vote)))
    }

    async fn vote_counts(&self) -> StoreResult<HashMap<PetitionId, usize>> {
        let mut counts = HashMap::new();
        self.votes
            .retain_async(|key, _| {
                *counts.entry(key.0).or_insert(0) += 1;
                true
            })
            .await;
        Ok(counts)
    }

    async fn voted_petitions(&self, user: UserId) -> StoreResult<HashSet<PetitionId>> {
        let mut voted = HashSet::new();
        self.votes
            .retain_async(|key, _| {
                if key.1 == user {
                    voted.insert(key.0);
                }
                true
            })
            .await;
        Ok(voted)
    }
}

#[async_trait]
impl UserRepository for Store {
    async fn user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.users.read_async(&id, |_, v| v.clone()).await)
    }

    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let Some(id) = self.usernames.read_async(username, |_, id| *id).await else {
            return Ok(None);
        };
        self.user(id).await
    }

    async fn register_user(
        &self,
        username: String,
        password_hash: String,
        is_staff: bool,
    ) -> StoreResult<Insert<User>> {
        let mut journal = self.journal.lock().await;
        match self.usernames.entry_async(username.clone()).await {
            Entry::Occupied(o) => {
                let id = *o.get();
                let existing = self.users.read_async(&id, |_, v| v.clone()).await;
                existing.map(Insert::Existing).ok_or_else(|| {
                    StoreError::Conflict(format!("username {} points at missing user {}", username, id))
                })
            }
            Entry::Vacant(v) => {
                let user = User {
                    id: UserId(Sequences::next(&self.seq.user)),
                    username,
                    password_hash,
                    is_staff,
                    joined_at: Utc::now(),
                };
                record(&mut journal, &StoreEvent::UserRegistered(user.clone()))?;
                upsert(&self.users, user.id, user.clone());
                v.insert_entry(user.id);
                Ok(Insert::Created(user))
            }
        }
    }
}
