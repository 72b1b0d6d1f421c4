use crate::models::{
    HiddenMovie, Movie, MovieId, MoviePetition, PetitionId, PetitionStatus, PetitionVote, Review,
    ReviewId, User, UserId,
};
use serde::{Deserialize, Serialize};

/// Every mutation the store journals
///
/// Applying an event is idempotent with respect to the row it carries, so a
/// replay rebuilds exactly the tables that were live when the journal was
/// written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StoreEvent {
    MovieAdded(Movie),
    /// Cascades to the movie's reviews and hidden markers
    MovieRemoved { id: MovieId },
    ReviewPosted(Review),
    ReviewEdited { id: ReviewId, comment: String },
    ReviewDeleted { id: ReviewId },
    MovieHidden(HiddenMovie),
    MovieUnhidden { user: UserId, movie: MovieId },
    PetitionFiled(MoviePetition),
    PetitionDecided { id: PetitionId, status: PetitionStatus },
    /// Cascades to the petition's votes
    PetitionRemoved { id: PetitionId },
    VoteCast(PetitionVote),
    VoteWithdrawn { petition: PetitionId, user: UserId },
    UserRegistered(User),
}

impl StoreEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            StoreEvent::MovieAdded(_) => "MovieAdded",
            StoreEvent::MovieRemoved { .. } => "MovieRemoved",
            StoreEvent::ReviewPosted(_) => "ReviewPosted",
            StoreEvent::ReviewEdited { .. } => "ReviewEdited",
            StoreEvent::ReviewDeleted { .. } => "ReviewDeleted",
            StoreEvent::MovieHidden(_) => "MovieHidden",
            StoreEvent::MovieUnhidden { .. } => "MovieUnhidden",
            StoreEvent::PetitionFiled(_) => "PetitionFiled",
            StoreEvent::PetitionDecided { .. } => "PetitionDecided",
            StoreEvent::PetitionRemoved { .. } => "PetitionRemoved",
            StoreEvent::VoteCast(_) => "VoteCast",
            StoreEvent::VoteWithdrawn { .. } => "VoteWithdrawn",
            StoreEvent::UserRegistered(_) => "UserRegistered",
        }
    }

    /// `table:id` of the row the event touches
    pub fn aggregate_id(&self) -> String {
        match self {
            StoreEvent::MovieAdded(movie) => format!("movie:{}", movie.id),
            StoreEvent::MovieRemoved { id } => format!("movie:{}", id),
            StoreEvent::ReviewPosted(review) => format!("review:{}", review.id),
            StoreEvent::ReviewEdited { id, .. } | StoreEvent::ReviewDeleted { id } => {
                format!("review:{}", id)
            }
            StoreEvent::MovieHidden(marker) => format!("hidden:{}:{}", marker.user, marker.movie),
            StoreEvent::MovieUnhidden { user, movie } => format!("hidden:{}:{}", user, movie),
            StoreEvent::PetitionFiled(petition) => format!("petition:{}", petition.id),
            StoreEvent::PetitionDecided { id, .. } | StoreEvent::PetitionRemoved { id } => {
                format!("petition:{}", id)
            }
            StoreEvent::VoteCast(vote) => format!("vote:{}:{}", vote.petition, vote.user),
            StoreEvent::VoteWithdrawn { petition, user } => format!("vote:{}:{}", petition, user),
            StoreEvent::UserRegistered(user) => format!("user:{}", user.id),
        }
    }
}
