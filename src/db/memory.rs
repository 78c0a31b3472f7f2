use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    db::{CatalogFilter, CatalogStore, HistoryStore},
    error::AppResult,
    models::{Book, ReadingHistory},
};

/// In-memory implementation of both store capabilities.
///
/// Serves as the injectable fixture for tests and demos: datasets are seeded
/// through `insert_*` calls rather than baked in as constants. Books keep
/// their insertion order, which makes list results and score ties
/// reproducible across calls.
#[derive(Default)]
pub struct MemoryStore {
    books: RwLock<Vec<Book>>,
    histories: RwLock<HashMap<Uuid, ReadingHistory>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_book(&self, book: Book) {
        self.books.write().await.push(book);
    }

    pub async fn insert_books(&self, books: impl IntoIterator<Item = Book>) {
        self.books.write().await.extend(books);
    }

    /// Registers a user, empty history included; a registered user with no
    /// reads is a cold-start user, not an unknown one.
    pub async fn insert_history(&self, user_id: Uuid, history: ReadingHistory) {
        self.histories.write().await.insert(user_id, history);
    }

    fn matches_filter(book: &Book, filter: &CatalogFilter) -> bool {
        if !book.is_active() {
            return false;
        }

        if let Some(search) = &filter.search {
            if !Self::matches_search(book, search) {
                return false;
            }
        }

        if let Some(genre) = &filter.genre {
            if !book.genres.iter().any(|g| g == genre) {
                return false;
            }
        }

        if let Some(author) = &filter.author {
            if !book.author.to_lowercase().contains(&author.to_lowercase()) {
                return false;
            }
        }

        if let Some(min_rating) = filter.min_rating {
            if book.average_rating < min_rating {
                return false;
            }
        }

        if let Some(max_price) = filter.max_price {
            if !book.prices.within(max_price) {
                return false;
            }
        }

        true
    }

    /// Every whitespace-separated term must appear somewhere in the book's
    /// text fields. Relevance ranking is a real search engine's job; this
    /// only restricts the result set.
    fn matches_search(book: &Book, search: &str) -> bool {
        let haystack = format!(
            "{} {} {} {}",
            book.title,
            book.author,
            book.description.as_deref().unwrap_or(""),
            book.genres.join(" ")
        )
        .to_lowercase();

        search
            .split_whitespace()
            .all(|term| haystack.contains(&term.to_lowercase()))
    }

    fn without_reviews(book: &Book) -> Book {
        Book {
            reviews: Vec::new(),
            ..book.clone()
        }
    }
}

#[async_trait::async_trait]
impl CatalogStore for MemoryStore {
    async fn find_active(&self, filter: &CatalogFilter) -> AppResult<Vec<Book>> {
        let books = self.books.read().await;
        Ok(books
            .iter()
            .filter(|b| Self::matches_filter(b, filter))
            .map(Self::without_reviews)
            .collect())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Book>> {
        let books = self.books.read().await;
        Ok(books.iter().find(|b| b.id == id).cloned())
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Book>> {
        let wanted: HashSet<Uuid> = ids.iter().copied().collect();
        let books = self.books.read().await;
        Ok(books
            .iter()
            .filter(|b| wanted.contains(&b.id))
            .map(Self::without_reviews)
            .collect())
    }

    async fn find_recommendable(
        &self,
        exclude: &HashSet<Uuid>,
        genres: &[String],
        authors: &[String],
        rating_floor: f64,
    ) -> AppResult<Vec<Book>> {
        let books = self.books.read().await;
        Ok(books
            .iter()
            .filter(|b| b.is_active() && !exclude.contains(&b.id))
            .filter(|b| {
                b.average_rating >= rating_floor
                    || b.genres.iter().any(|g| genres.contains(g))
                    || authors.contains(&b.author)
            })
            .map(Self::without_reviews)
            .collect())
    }
}

#[async_trait::async_trait]
impl HistoryStore for MemoryStore {
    async fn fetch_history(&self, user_id: Uuid) -> AppResult<Option<ReadingHistory>> {
        let histories = self.histories.read().await;
        Ok(histories.get(&user_id).cloned())
    }
}
