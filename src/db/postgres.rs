use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    db::{CatalogFilter, CatalogStore, HistoryStore},
    error::AppResult,
    models::{Book, BookPrices, BookStatus, ReadingHistory, Review},
};

/// Columns fetched for every book query; reviews live in their own table
/// and are only joined in by the single-book lookup.
const BOOK_COLUMNS: &str = "id, title, author, description, genres, average_rating, \
     ratings_count, status, price_paperback, price_hardcover, price_ebook, \
     price_audiobook, created_at";

/// PostgreSQL-backed implementation of both store capabilities
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookRow {
    id: Uuid,
    title: String,
    author: String,
    description: Option<String>,
    genres: Vec<String>,
    average_rating: f64,
    ratings_count: i32,
    status: String,
    price_paperback: Option<f64>,
    price_hardcover: Option<f64>,
    price_ebook: Option<f64>,
    price_audiobook: Option<f64>,
    created_at: DateTime<Utc>,
}

impl From<BookRow> for Book {
    fn from(row: BookRow) -> Self {
        Book {
            id: row.id,
            title: row.title,
            author: row.author,
            description: row.description,
            genres: row.genres,
            average_rating: row.average_rating,
            ratings_count: u32::try_from(row.ratings_count).unwrap_or(0),
            status: BookStatus::from_column(&row.status),
            prices: BookPrices {
                paperback: row.price_paperback,
                hardcover: row.price_hardcover,
                ebook: row.price_ebook,
                audiobook: row.price_audiobook,
            },
            created_at: row.created_at,
            reviews: Vec::new(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    reviewer: String,
    rating: i16,
    comment: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Review {
            reviewer: row.reviewer,
            rating: u8::try_from(row.rating).unwrap_or(0),
            comment: row.comment,
            created_at: row.created_at,
        }
    }
}

fn book_select() -> QueryBuilder<'static, Postgres> {
    QueryBuilder::new(format!(
        "SELECT {} FROM books WHERE status = 'active'",
        BOOK_COLUMNS
    ))
}

#[async_trait::async_trait]
impl CatalogStore for PgStore {
    async fn find_active(&self, filter: &CatalogFilter) -> AppResult<Vec<Book>> {
        let mut query = book_select();

        if let Some(search) = &filter.search {
            // Genres are folded into the queried document at match time;
            // the expression index in the migration covers the text columns.
            query
                .push(
                    " AND to_tsvector('english', title || ' ' || author || ' ' || \
                     coalesce(description, '') || ' ' || array_to_string(genres, ' ')) \
                     @@ plainto_tsquery('english', ",
                )
                .push_bind(search.clone())
                .push(")");
        }

        if let Some(genre) = &filter.genre {
            query
                .push(" AND ")
                .push_bind(genre.clone())
                .push(" = ANY(genres)");
        }

        if let Some(author) = &filter.author {
            query
                .push(" AND author ILIKE '%' || ")
                .push_bind(author.clone())
                .push(" || '%'");
        }

        if let Some(min_rating) = filter.min_rating {
            query.push(" AND average_rating >= ").push_bind(min_rating);
        }

        if let Some(max_price) = filter.max_price {
            // Hardcover and audiobook prices never participate in the ceiling
            query
                .push(" AND (price_paperback <= ")
                .push_bind(max_price)
                .push(" OR price_ebook <= ")
                .push_bind(max_price)
                .push(")");
        }

        let rows: Vec<BookRow> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(matched = rows.len(), "Catalog filter query complete");

        Ok(rows.into_iter().map(Book::from).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Book>> {
        let sql = format!("SELECT {} FROM books WHERE id = $1", BOOK_COLUMNS);
        let row: Option<BookRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut book = Book::from(row);

        let reviews: Vec<ReviewRow> = sqlx::query_as(
            "SELECT reviewer, rating, comment, created_at FROM reviews \
             WHERE book_id = $1 ORDER BY created_at DESC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        book.reviews = reviews.into_iter().map(Review::from).collect();

        Ok(Some(book))
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Book>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!("SELECT {} FROM books WHERE id = ANY($1)", BOOK_COLUMNS);
        let rows: Vec<BookRow> = sqlx::query_as(&sql)
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Book::from).collect())
    }

    async fn find_recommendable(
        &self,
        exclude: &HashSet<Uuid>,
        genres: &[String],
        authors: &[String],
        rating_floor: f64,
    ) -> AppResult<Vec<Book>> {
        let mut query = book_select();

        if !exclude.is_empty() {
            let excluded: Vec<Uuid> = exclude.iter().copied().collect();
            query
                .push(" AND NOT (id = ANY(")
                .push_bind(excluded)
                .push("))");
        }

        query.push(" AND (average_rating >= ").push_bind(rating_floor);

        if !genres.is_empty() {
            query.push(" OR genres && ").push_bind(genres.to_vec());
        }

        if !authors.is_empty() {
            query
                .push(" OR author = ANY(")
                .push_bind(authors.to_vec())
                .push(")");
        }

        query.push(")");

        let rows: Vec<BookRow> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Book::from).collect())
    }
}

#[async_trait::async_trait]
impl HistoryStore for PgStore {
    async fn fetch_history(&self, user_id: Uuid) -> AppResult<Option<ReadingHistory>> {
        let known: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        if known.is_none() {
            return Ok(None);
        }

        let rows: Vec<(Uuid, String)> =
            sqlx::query_as("SELECT book_id, shelf FROM user_books WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

        let mut history = ReadingHistory::default();
        for (book_id, shelf) in rows {
            match shelf.as_str() {
                "read" => history.read_ids.push(book_id),
                "wishlist" => history.wishlist_ids.push(book_id),
                other => {
                    tracing::warn!(user_id = %user_id, shelf = %other, "Unknown shelf value")
                }
            }
        }

        Ok(Some(history))
    }
}
