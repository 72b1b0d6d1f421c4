//! Startup seed file
//!
//! ```json
//! {
//!   "users": [{ "username": "admin", "password": "change-me-now", "is_staff": true }],
//!   "movies": [{ "name": "Alien", "price": 12, "description": "In space...", "image": "alien.jpg" }]
//! }
//! ```

use anyhow::{Context, Result};
use marquee_core::models::{Identity, NewMovie, UserId};
use marquee_core::App;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedFile {
    pub users: Vec<SeedUser>,
    pub movies: Vec<NewMovie>,
}

#[derive(Debug, Deserialize)]
pub struct SeedUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub is_staff: bool,
}

pub fn load(path: &Path) -> Result<SeedFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse seed file {}", path.display()))
}

/// Load `path` into an empty store; returns false when data already exists
pub async fn apply(app: &App, path: &Path) -> Result<bool> {
    let stats = app.store().stats();
    if stats.users > 0 || stats.movies > 0 {
        return Ok(false);
    }

    let seed = load(path)?;
    for user in &seed.users {
        app.accounts()
            .register(&user.username, &user.password, user.is_staff)
            .await
            .with_context(|| format!("Failed to seed user {}", user.username))?;
    }

    // Seeding acts with staff rights regardless of the seeded accounts
    let seeder = Identity { id: UserId(0), username: "seed".to_string(), is_staff: true };
    for movie in seed.movies {
        let name = movie.name.clone();
        app.catalog()
            .add_movie(&seeder, movie)
            .await
            .with_context(|| format!("Failed to seed movie {}", name))?;
    }

    log::info!("Seed: {} users, {} movies", seed.users.len(), app.store().stats().movies);
    Ok(true)
}
