use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    db::{Cache, CacheKey, CatalogFilter, CatalogStore},
    error::AppResult,
    models::{Book, BookPrices, BookStatus},
};

pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Browse parameters as they arrive on the wire
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogQueryParams {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    pub search: Option<String>,
    pub genre: Option<String>,
    pub author: Option<String>,
    pub min_rating: Option<f64>,
    pub max_price: Option<f64>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

impl CatalogQueryParams {
    /// Requested page, floored at 1
    pub fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    /// Requested page size, floored at 1. Deliberately uncapped: the caller
    /// controls how much of the result set a page carries.
    pub fn page_size(&self) -> usize {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1)
    }

    pub fn sort_key(&self) -> &str {
        self.sort_by.as_deref().unwrap_or("title")
    }

    pub fn descending(&self) -> bool {
        matches!(self.order.as_deref(), Some("desc"))
    }

    /// The store-side portion of the parameters
    pub fn filter(&self) -> CatalogFilter {
        CatalogFilter {
            search: self.search.clone(),
            genre: self.genre.clone(),
            author: self.author.clone(),
            min_rating: self.min_rating,
            max_price: self.max_price,
        }
    }

    /// Deterministic cache key covering every parameter that shapes the page
    fn fingerprint(&self) -> String {
        format!(
            "p{}:s{}:q={}:genre={}:author={}:min={}:max={}:sort={}:{}",
            self.page(),
            self.page_size(),
            self.search.as_deref().unwrap_or("").to_lowercase(),
            self.genre.as_deref().unwrap_or(""),
            self.author.as_deref().unwrap_or("").to_lowercase(),
            self.min_rating.map(|r| r.to_string()).unwrap_or_default(),
            self.max_price.map(|p| p.to_string()).unwrap_or_default(),
            self.sort_key(),
            if self.descending() { "desc" } else { "asc" },
        )
    }
}

/// A book as it appears in list responses: everything but the reviews
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookSummary {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub genres: Vec<String>,
    pub average_rating: f64,
    pub ratings_count: u32,
    pub status: BookStatus,
    pub prices: BookPrices,
    pub created_at: DateTime<Utc>,
}

impl From<&Book> for BookSummary {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id,
            title: book.title.clone(),
            author: book.author.clone(),
            description: book.description.clone(),
            genres: book.genres.clone(),
            average_rating: book.average_rating,
            ratings_count: book.ratings_count,
            status: book.status,
            prices: book.prices.clone(),
            created_at: book.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pagination {
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogPage {
    pub items: Vec<BookSummary>,
    pub pagination: Pagination,
}

/// Runs a catalog browse: store filter, then sort, then one page.
///
/// Pages are served from the cache when one is wired in; cache trouble
/// degrades to a store read and is never surfaced to the caller.
pub async fn query_catalog(
    catalog: Arc<dyn CatalogStore>,
    cache: Option<&Cache>,
    cache_ttl: u64,
    params: &CatalogQueryParams,
) -> AppResult<CatalogPage> {
    let key = CacheKey::CatalogPage(params.fingerprint());

    if let Some(cache) = cache {
        match cache.get_from_cache::<CatalogPage>(&key).await {
            Ok(Some(page)) => {
                tracing::debug!(key = %key, "Catalog page cache hit");
                return Ok(page);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Catalog page cache read failed"),
        }
    }

    let mut books = catalog.find_active(&params.filter()).await?;

    let total = books.len();
    let page = params.page();
    let page_size = params.page_size();
    let total_pages = total.div_ceil(page_size);

    sort_books(&mut books, params.sort_key(), params.descending());

    let items: Vec<BookSummary> = books
        .iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .map(BookSummary::from)
        .collect();

    tracing::debug!(total, page, page_size, "Catalog query complete");

    let result = CatalogPage {
        items,
        pagination: Pagination {
            page,
            page_size,
            total,
            total_pages,
        },
    };

    if let Some(cache) = cache {
        cache.set_in_background(&key, &result, cache_ttl);
    }

    Ok(result)
}

/// Stable sort with three special-cased keys. Every other key, known or
/// not, sorts by the literal field of that name on the serialized book.
/// This is the permissive pass-through contract: an unexpected `sort_by`
/// value is never rejected, and a name that matches nothing leaves the
/// order alone.
fn sort_books(books: &mut Vec<Book>, sort_key: &str, descending: bool) {
    match sort_key {
        "rating" => books.sort_by(|a, b| {
            directed(
                a.average_rating
                    .partial_cmp(&b.average_rating)
                    .unwrap_or(Ordering::Equal),
                descending,
            )
        }),
        "popularity" => {
            books.sort_by(|a, b| directed(a.ratings_count.cmp(&b.ratings_count), descending))
        }
        "date" => books.sort_by(|a, b| directed(a.created_at.cmp(&b.created_at), descending)),
        field => {
            let mut keyed: Vec<(Value, Book)> = std::mem::take(books)
                .into_iter()
                .map(|book| {
                    let key_value = serde_json::to_value(&book)
                        .ok()
                        .and_then(|v| v.get(field).cloned())
                        .unwrap_or(Value::Null);
                    (key_value, book)
                })
                .collect();
            keyed.sort_by(|a, b| directed(json_ordering(&a.0, &b.0), descending));
            *books = keyed.into_iter().map(|(_, book)| book).collect();
        }
    }
}

fn directed(ord: Ordering, descending: bool) -> Ordering {
    if descending {
        ord.reverse()
    } else {
        ord
    }
}

/// Orders two serialized field values; mismatched or missing values
/// compare equal, so the surrounding stable sort leaves them in place
fn json_ordering(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}
