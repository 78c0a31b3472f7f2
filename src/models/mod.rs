use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod profile;

pub use profile::{ReaderProfile, ReadingHistory};

/// Shelf lifecycle of a catalog entry. Only `Active` books are ever
/// returned by browsing or recommendation queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookStatus {
    Active,
    Inactive,
    Discontinued,
}

impl BookStatus {
    /// Parses the status column value; anything unrecognized is treated as
    /// `Inactive` so malformed rows can never leak into active-only queries.
    pub fn from_column(value: &str) -> Self {
        match value {
            "active" => BookStatus::Active,
            "discontinued" => BookStatus::Discontinued,
            _ => BookStatus::Inactive,
        }
    }

    pub fn as_column(&self) -> &'static str {
        match self {
            BookStatus::Active => "active",
            BookStatus::Inactive => "inactive",
            BookStatus::Discontinued => "discontinued",
        }
    }
}

/// Per-format pricing; each format is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookPrices {
    pub paperback: Option<f64>,
    pub hardcover: Option<f64>,
    pub ebook: Option<f64>,
    pub audiobook: Option<f64>,
}

impl BookPrices {
    /// Whether the book clears a price ceiling. Only the paperback and ebook
    /// formats participate; hardcover and audiobook prices are never
    /// compared. A hardcover-only book does not match any ceiling.
    pub fn within(&self, max_price: f64) -> bool {
        [self.paperback, self.ebook]
            .iter()
            .any(|price| matches!(price, Some(p) if *p <= max_price))
    }
}

/// A reader review attached to a book. Reviews are the heavy sub-resource:
/// list queries never hydrate them, only the single-book lookup does.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub reviewer: String,
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A catalog entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    /// Genre tags; membership only, no per-tag weighting
    pub genres: Vec<String>,
    /// Mean reader rating in [0, 5]. Stays 0.0 (never null) while
    /// `ratings_count` is zero so downstream arithmetic is total.
    pub average_rating: f64,
    pub ratings_count: u32,
    pub status: BookStatus,
    pub prices: BookPrices,
    pub created_at: DateTime<Utc>,
    pub reviews: Vec<Review>,
}

impl Book {
    /// Creates a new active book with no ratings
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            author: author.into(),
            description: None,
            genres: Vec::new(),
            average_rating: 0.0,
            ratings_count: 0,
            status: BookStatus::Active,
            prices: BookPrices::default(),
            created_at: Utc::now(),
            reviews: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == BookStatus::Active
    }
}

/// A single scored recommendation. Ephemeral: computed per request,
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub book: Book,
    /// Weighted relevance score, 0..=100
    pub score: u32,
    /// Human-readable justifications, most significant first
    pub reasons: Vec<String>,
}
