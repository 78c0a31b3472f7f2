use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Book;

/// A user's stored interaction history: books they have read and books they
/// have saved for later. Both sets are excluded from recommendations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReadingHistory {
    pub read_ids: Vec<Uuid>,
    pub wishlist_ids: Vec<Uuid>,
}

impl ReadingHistory {
    /// All book ids the user has already engaged with, in either way
    pub fn engaged_ids(&self) -> HashSet<Uuid> {
        self.read_ids
            .iter()
            .chain(self.wishlist_ids.iter())
            .copied()
            .collect()
    }
}

/// Taste signals derived from the books a user has read.
///
/// Rebuilt from scratch on every recommendation request, so it is always
/// consistent with the latest history read and carries no staleness concerns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReaderProfile {
    /// Genre multiset: each read book contributes each of its genres once
    /// per occurrence. A genre read across many books accumulates weight
    /// through repetition, not through any explicit counter.
    favorite_genres: Vec<String>,
    favorite_authors: HashSet<String>,
}

impl ReaderProfile {
    /// Derives a profile from the user's read books
    pub fn from_books(read_books: &[Book]) -> Self {
        let mut favorite_genres = Vec::new();
        let mut favorite_authors = HashSet::new();

        for book in read_books {
            favorite_genres.extend(book.genres.iter().cloned());
            favorite_authors.insert(book.author.clone());
        }

        Self {
            favorite_genres,
            favorite_authors,
        }
    }

    /// Total genre occurrences across the history (multiset size, duplicates
    /// counted)
    pub fn genre_occurrences(&self) -> usize {
        self.favorite_genres.len()
    }

    /// Membership test against the multiset; frequency is irrelevant here
    pub fn has_genre(&self, genre: &str) -> bool {
        self.favorite_genres.iter().any(|g| g == genre)
    }

    pub fn has_author(&self, author: &str) -> bool {
        self.favorite_authors.contains(author)
    }

    /// Distinct genres, for handing to store-side membership filters
    pub fn distinct_genres(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.favorite_genres
            .iter()
            .filter(|g| seen.insert(g.as_str()))
            .cloned()
            .collect()
    }

    pub fn authors(&self) -> Vec<String> {
        self.favorite_authors.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.favorite_genres.is_empty() && self.favorite_authors.is_empty()
    }
}
