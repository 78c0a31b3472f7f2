use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::Book,
    routes::AppState,
    services::catalog::{self, CatalogPage, CatalogQueryParams},
};

/// Handler for catalog browsing
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CatalogQueryParams>,
) -> AppResult<Json<CatalogPage>> {
    let page = catalog::query_catalog(
        state.catalog.clone(),
        state.cache.as_ref(),
        state.cache_ttl,
        &params,
    )
    .await?;

    Ok(Json(page))
}

/// Handler for a single book, reviews included.
///
/// Inactive books 404 like absent ones; the catalog only ever shows
/// active entries.
pub async fn detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Book>> {
    let book = state
        .catalog
        .find_by_id(id)
        .await?
        .filter(Book::is_active)
        .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))?;

    Ok(Json(book))
}
