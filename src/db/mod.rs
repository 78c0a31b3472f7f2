use std::collections::HashSet;

use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{Book, ReadingHistory},
};

pub mod memory;
pub mod postgres;
pub mod redis;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use self::redis::{create_redis_client, Cache, CacheKey};

/// Filter applied by the store before the catalog service sorts and
/// paginates. Every field is optional; absent fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogFilter {
    /// Free-text restriction over title, author, description and genres
    pub search: Option<String>,
    /// Exact genre-tag membership
    pub genre: Option<String>,
    /// Case-insensitive substring of the author name
    pub author: Option<String>,
    pub min_rating: Option<f64>,
    /// Matched against paperback and ebook prices only
    pub max_price: Option<f64>,
}

/// Read-only catalog lookup capability
///
/// Any storage engine that can filter on tags, authors and ratings works
/// here; the service layer owns ordering, pagination and scoring.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Active books matching the filter, in no particular order
    async fn find_active(&self, filter: &CatalogFilter) -> AppResult<Vec<Book>>;

    /// Single book with its reviews hydrated; `None` when absent
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Book>>;

    /// Books by id, reviews not hydrated; unknown ids are skipped
    async fn find_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Book>>;

    /// Candidate pool for recommendations: active books outside `exclude`
    /// matching at least one of genre overlap, author membership, or
    /// `average_rating >= rating_floor`.
    async fn find_recommendable(
        &self,
        exclude: &HashSet<Uuid>,
        genres: &[String],
        authors: &[String],
        rating_floor: f64,
    ) -> AppResult<Vec<Book>>;
}

/// Read-only user history lookup capability
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    /// The user's reading history; `None` for an unknown user, which is
    /// distinct from a known user with an empty history.
    async fn fetch_history(&self, user_id: Uuid) -> AppResult<Option<ReadingHistory>>;
}

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}
