//! Catalog entities
//!
//! Plain data rows stored in the [`crate::store::Store`] tables. Every
//! table has its own auto-incrementing integer id, wrapped in a newtype so
//! a `ReviewId` can never be passed where a `MovieId` is expected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! table_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map($name)
            }
        }
    };
}

table_id!(
    /// Primary key of a [`Movie`]
    MovieId
);
table_id!(
    /// Primary key of a [`Review`]
    ReviewId
);
table_id!(
    /// Primary key of a [`HiddenMovie`] marker
    HiddenMovieId
);
table_id!(
    /// Primary key of a [`MoviePetition`]
    PetitionId
);
table_id!(
    /// Primary key of a [`PetitionVote`]
    VoteId
);
table_id!(
    /// Primary key of a [`User`]
    UserId
);

/// A movie in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub name: String,
    pub price: i64,
    pub description: String,
    /// Poster reference (path or URL); the image bytes live elsewhere
    pub image: String,
}

/// Fields needed to add a movie; the store assigns the id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMovie {
    pub name: String,
    pub price: i64,
    pub description: String,
    #[serde(default)]
    pub image: String,
}

/// A user's comment on a movie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub movie: MovieId,
    pub user: UserId,
}

/// Per-user visibility marker: `user` does not want to see `movie` in listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiddenMovie {
    pub id: HiddenMovieId,
    pub movie: MovieId,
    pub user: UserId,
}

/// Lifecycle of a petition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PetitionStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl PetitionStatus {
    pub fn is_pending(self) -> bool {
        self == PetitionStatus::Pending
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PetitionStatus::Pending => "pending",
            PetitionStatus::Approved => "approved",
            PetitionStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for PetitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to add a movie to the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoviePetition {
    pub id: PetitionId,
    pub movie_title: String,
    /// Why should this movie be added?
    pub description: String,
    pub petitioner: UserId,
    pub created_at: DateTime<Utc>,
    pub status: PetitionStatus,
}

/// One user's support for one petition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetitionVote {
    pub id: VoteId,
    pub petition: PetitionId,
    pub user: UserId,
    pub voted_at: DateTime<Utc>,
}

/// A registered account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// Argon2id PHC string
    pub password_hash: String,
    pub is_staff: bool,
    pub joined_at: DateTime<Utc>,
}

/// The authenticated requester, threaded explicitly through every service call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub username: String,
    pub is_staff: bool,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self { id: user.id, username: user.username.clone(), is_staff: user.is_staff }
    }
}
