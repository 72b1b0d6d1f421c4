//! JSON view-models returned by the page endpoints

use crate::models::{Movie, MovieId, PetitionId, PetitionStatus, ReviewId};
use crate::orders::TopCustomer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Info,
    Success,
    Error,
}

/// One-shot message carried in the session until the next page renders it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: FlashLevel,
    pub text: String,
}

impl FlashMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self { level: FlashLevel::Info, text: text.into() }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self { level: FlashLevel::Success, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { level: FlashLevel::Error, text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieListView {
    /// Echo of the search term, `None` when no filter applied
    pub search: Option<String>,
    pub movies: Vec<Movie>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewView {
    pub id: ReviewId,
    pub movie: MovieId,
    pub comment: String,
    pub date: DateTime<Utc>,
    pub username: String,
    /// True when the requester wrote this review
    pub is_owner: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieDetailView {
    pub movie: Movie,
    pub reviews: Vec<ReviewView>,
    pub is_hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewEditView {
    pub movie: Movie,
    pub review: ReviewView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiddenMoviesView {
    pub movies: Vec<Movie>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetitionView {
    pub id: PetitionId,
    pub movie_title: String,
    pub description: String,
    pub petitioner: String,
    pub created_at: DateTime<Utc>,
    pub status: PetitionStatus,
    pub vote_count: usize,
    pub user_has_voted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetitionListView {
    pub petitions: Vec<PetitionView>,
}

/// Petition creation form, re-sent with errors and the submitted values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetitionFormView {
    pub errors: Vec<String>,
    pub movie_title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopCustomerView {
    pub top_customer: Option<TopCustomer>,
}

/// Returned by signup and login; `token` doubles as a Bearer credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    pub username: String,
    pub is_staff: bool,
    pub token: String,
}

/// Login form; `next` is where a successful login redirects
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginFormView {
    pub next: Option<String>,
    pub fields: Vec<String>,
}
