use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use uuid::Uuid;

use crate::{
    db::{CatalogStore, HistoryStore},
    error::AppResult,
    models::{Book, ReaderProfile, Recommendation},
};

/// Score weights. The four components sum to a 100-point scale.
pub const GENRE_WEIGHT: f64 = 40.0;
pub const AUTHOR_WEIGHT: f64 = 20.0;
pub const RATING_WEIGHT: f64 = 30.0;
pub const POPULARITY_WEIGHT: f64 = 10.0;

/// A book with no genre or author overlap still enters the candidate pool
/// at or above this rating
pub const STANDALONE_RATING_FLOOR: f64 = 4.0;

/// Reason thresholds
pub const HIGHLY_RATED_THRESHOLD: f64 = 4.5;
pub const POPULAR_RATINGS_COUNT: u32 = 50;

/// Ratings count at which the popularity component saturates
pub const POPULARITY_SATURATION: f64 = 100.0;

pub const DEFAULT_LIMIT: usize = 10;

/// Produces up to `limit` scored recommendations for a user.
///
/// Best-effort by contract: an unknown user or a store fetch that exceeds
/// `fetch_timeout` yields an empty list, not an error. A store that fails
/// outright is a different matter and propagates, so a broken upstream is
/// never dressed up as "nothing to recommend".
pub async fn recommend_for_user(
    catalog: Arc<dyn CatalogStore>,
    history: Arc<dyn HistoryStore>,
    user_id: Uuid,
    limit: usize,
    fetch_timeout: Duration,
) -> AppResult<Vec<Recommendation>> {
    match timeout(fetch_timeout, load_inputs(catalog, history, user_id)).await {
        Err(_) => {
            tracing::warn!(user_id = %user_id, "Store fetch timed out; returning no recommendations");
            Ok(Vec::new())
        }
        Ok(Err(e)) => Err(e),
        Ok(Ok(None)) => {
            tracing::debug!(user_id = %user_id, "Unknown user; returning no recommendations");
            Ok(Vec::new())
        }
        Ok(Ok(Some((profile, candidates)))) => {
            let recommendations = rank_candidates(candidates, &profile, limit);
            tracing::info!(
                user_id = %user_id,
                count = recommendations.len(),
                "Recommendations computed"
            );
            Ok(recommendations)
        }
    }
}

/// Gathers everything the scorer needs in one pass: the user's history, the
/// profile derived from their read books, and the OR-filtered candidate
/// pool. `None` means the user does not exist.
async fn load_inputs(
    catalog: Arc<dyn CatalogStore>,
    history: Arc<dyn HistoryStore>,
    user_id: Uuid,
) -> AppResult<Option<(ReaderProfile, Vec<Book>)>> {
    let Some(reading) = history.fetch_history(user_id).await? else {
        return Ok(None);
    };

    let read_books = catalog.find_by_ids(&reading.read_ids).await?;
    let profile = ReaderProfile::from_books(&read_books);

    let candidates = catalog
        .find_recommendable(
            &reading.engaged_ids(),
            &profile.distinct_genres(),
            &profile.authors(),
            STANDALONE_RATING_FLOOR,
        )
        .await?;

    Ok(Some((profile, candidates)))
}

/// The two-stage ranking pass.
///
/// Stage one orders the pool by rating (ties by ratings count) and cuts it
/// to `limit`; stage two scores only the survivors. A book cut in stage one
/// is gone even if it would have outscored every survivor: the fine score
/// only reorders the coarse top slice.
pub fn rank_candidates(
    mut pool: Vec<Book>,
    profile: &ReaderProfile,
    limit: usize,
) -> Vec<Recommendation> {
    pool.sort_by(|a, b| {
        b.average_rating
            .partial_cmp(&a.average_rating)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.ratings_count.cmp(&a.ratings_count))
    });
    pool.truncate(limit);

    let mut recommendations: Vec<Recommendation> = pool
        .into_iter()
        .map(|book| {
            let (score, reasons) = score_book(&book, profile);
            Recommendation {
                book,
                score,
                reasons,
            }
        })
        .collect();

    // Stable sort: score ties keep their stage-one order
    recommendations.sort_by(|a, b| b.score.cmp(&a.score));
    recommendations
}

/// Scores one candidate against the profile and names the reasons, in
/// fixed order: genres, author, rating, popularity.
pub fn score_book(book: &Book, profile: &ReaderProfile) -> (u32, Vec<String>) {
    // Each of the candidate's own tags counts once if it appears anywhere
    // in the multiset; multiset frequency only shows up in the denominator.
    let matched_genres = book.genres.iter().filter(|g| profile.has_genre(g)).count();
    let genre_points =
        matched_genres as f64 / profile.genre_occurrences().max(1) as f64 * GENRE_WEIGHT;

    let author_match = profile.has_author(&book.author);
    let author_points = if author_match { AUTHOR_WEIGHT } else { 0.0 };

    let rating_points = book.average_rating / 5.0 * RATING_WEIGHT;

    let popularity_points =
        (f64::from(book.ratings_count) / POPULARITY_SATURATION).min(1.0) * POPULARITY_WEIGHT;

    let score = (genre_points + author_points + rating_points + popularity_points).round() as u32;

    let mut reasons = Vec::new();
    if matched_genres > 0 {
        reasons.push(format!("Matches {} of your favorite genres", matched_genres));
    }
    if author_match {
        reasons.push("By an author you have read before".to_string());
    }
    if book.average_rating >= HIGHLY_RATED_THRESHOLD {
        reasons.push("Highly rated by readers".to_string());
    }
    if book.ratings_count > POPULAR_RATINGS_COUNT {
        reasons.push("Popular with other readers".to_string());
    }

    (score, reasons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, MockCatalogStore, MockHistoryStore};
    use crate::error::AppError;
    use crate::models::ReadingHistory;

    fn fixture_book(title: &str, author: &str, genres: &[&str], rating: f64, count: u32) -> Book {
        let mut book = Book::new(title, author);
        book.genres = genres.iter().map(|g| g.to_string()).collect();
        book.average_rating = rating;
        book.ratings_count = count;
        book
    }

    fn profile_of(read: &[Book]) -> ReaderProfile {
        ReaderProfile::from_books(read)
    }

    #[test]
    fn test_weights_sum_to_a_hundred() {
        assert_eq!(
            GENRE_WEIGHT + AUTHOR_WEIGHT + RATING_WEIGHT + POPULARITY_WEIGHT,
            100.0
        );
    }

    #[test]
    fn test_worked_scoring_example() {
        // Profile multiset: [Mystery, Mystery, SciFi], three occurrences
        let read = vec![
            fixture_book("r1", "someone", &["Mystery"], 4.0, 1),
            fixture_book("r2", "someone else", &["Mystery", "SciFi"], 4.0, 1),
        ];
        let profile = profile_of(&read);
        assert_eq!(profile.genre_occurrences(), 3);

        let candidate = fixture_book("A", "nobody", &["Mystery", "Thriller"], 4.6, 2156);
        let (score, reasons) = score_book(&candidate, &profile);

        // (1/3)*40 + 0 + (4.6/5)*30 + min(21.56, 1)*10 = 50.93.. → 51
        assert_eq!(score, 51);
        assert_eq!(
            reasons,
            vec![
                "Matches 1 of your favorite genres".to_string(),
                "Highly rated by readers".to_string(),
                "Popular with other readers".to_string(),
            ]
        );
    }

    #[test]
    fn test_rounding_is_half_up() {
        // rating component only: 4.25/5*30 = 25.5 → 26
        let candidate = fixture_book("B", "nobody", &[], 4.25, 0);
        let (score, _) = score_book(&candidate, &profile_of(&[]));
        assert_eq!(score, 26);
    }

    #[test]
    fn test_perfect_match_caps_at_a_hundred() {
        let read = vec![fixture_book("r", "Author", &["Mystery"], 5.0, 1)];
        let profile = profile_of(&read);

        let candidate = fixture_book("C", "Author", &["Mystery"], 5.0, 500);
        let (score, reasons) = score_book(&candidate, &profile);

        assert_eq!(score, 100);
        assert_eq!(reasons.len(), 4);
    }

    #[test]
    fn test_empty_profile_scores_rating_and_popularity_only() {
        let candidate = fixture_book("D", "nobody", &["Romance"], 4.0, 100);
        let (score, reasons) = score_book(&candidate, &profile_of(&[]));

        // 0 + 0 + 24 + 10
        assert_eq!(score, 34);
        assert_eq!(reasons, vec!["Popular with other readers".to_string()]);
    }

    #[test]
    fn test_reasons_keep_fixed_order() {
        let read = vec![fixture_book("r", "Author", &["Mystery"], 4.0, 1)];
        let profile = profile_of(&read);
        let candidate = fixture_book("E", "Author", &["Mystery"], 4.9, 200);

        let (_, reasons) = score_book(&candidate, &profile);
        assert_eq!(
            reasons,
            vec![
                "Matches 1 of your favorite genres".to_string(),
                "By an author you have read before".to_string(),
                "Highly rated by readers".to_string(),
                "Popular with other readers".to_string(),
            ]
        );
    }

    #[test]
    fn test_scores_stay_within_bounds() {
        let read = vec![
            fixture_book("r1", "A", &["Mystery", "Thriller"], 4.0, 1),
            fixture_book("r2", "B", &["SciFi"], 4.0, 1),
        ];
        let profile = profile_of(&read);

        let extremes = [
            fixture_book("zero", "C", &[], 0.0, 0),
            fixture_book("max", "A", &["Mystery", "Thriller", "SciFi"], 5.0, 10_000),
        ];
        for book in &extremes {
            let (score, _) = score_book(book, &profile);
            assert!(score <= 100);
        }
    }

    #[test]
    fn test_two_stage_truncation_is_preserved() {
        // "Perfect Fit" would outscore both fillers (author + genre match),
        // but it is third by rating and the limit is two. A scorer that
        // ranks the whole pool would return it; this test pins the
        // truncate-then-score order instead.
        let read = vec![fixture_book("r", "Favorite", &["Mystery"], 4.0, 1)];
        let profile = profile_of(&read);

        let filler_one = fixture_book("Filler One", "X", &[], 4.9, 10);
        let filler_two = fixture_book("Filler Two", "Y", &[], 4.8, 10);
        let perfect_fit = fixture_book("Perfect Fit", "Favorite", &["Mystery"], 4.0, 200);

        let (perfect_score, _) = score_book(&perfect_fit, &profile);
        let (filler_score, _) = score_book(&filler_one, &profile);
        assert!(perfect_score > filler_score, "fixture must make the cut matter");

        let ranked = rank_candidates(
            vec![filler_one, filler_two, perfect_fit],
            &profile,
            2,
        );

        let titles: Vec<&str> = ranked.iter().map(|r| r.book.title.as_str()).collect();
        assert_eq!(titles, vec!["Filler One", "Filler Two"]);
    }

    #[test]
    fn test_stage_one_ties_break_on_ratings_count() {
        let profile = profile_of(&[]);
        let less_popular = fixture_book("Less", "A", &[], 4.5, 10);
        let more_popular = fixture_book("More", "B", &[], 4.5, 90);

        let ranked = rank_candidates(vec![less_popular, more_popular], &profile, 1);
        assert_eq!(ranked[0].book.title, "More");
    }

    #[test]
    fn test_score_ties_keep_stage_one_order() {
        let profile = profile_of(&[]);
        // Identical scores; stage one orders by ratings count descending
        let first = fixture_book("First", "A", &[], 4.0, 100);
        let second = fixture_book("Second", "B", &[], 4.0, 100);

        let ranked = rank_candidates(vec![second.clone(), first.clone()], &profile, 10);
        assert_eq!(ranked[0].book.title, "Second");
        assert_eq!(ranked[1].book.title, "First");
        assert_eq!(ranked[0].score, ranked[1].score);
    }

    #[tokio::test]
    async fn test_unknown_user_gets_empty_list() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_book(fixture_book("Great", "A", &[], 4.9, 100))
            .await;

        let recs = recommend_for_user(
            store.clone(),
            store,
            Uuid::new_v4(),
            DEFAULT_LIMIT,
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert!(recs.is_empty());
    }

    #[tokio::test]
    async fn test_cold_start_user_gets_highly_rated_books_only() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_books([
                fixture_book("Acclaimed", "A", &["Mystery"], 4.6, 300),
                fixture_book("Decent", "B", &["Mystery"], 3.8, 400),
                fixture_book("Solid", "C", &[], 4.0, 50),
            ])
            .await;
        let user = Uuid::new_v4();
        store.insert_history(user, ReadingHistory::default()).await;

        let recs = recommend_for_user(
            store.clone(),
            store,
            user,
            DEFAULT_LIMIT,
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        let titles: Vec<&str> = recs.iter().map(|r| r.book.title.as_str()).collect();
        assert_eq!(titles, vec!["Acclaimed", "Solid"]);
        assert!(recs
            .iter()
            .all(|r| r.book.average_rating >= STANDALONE_RATING_FLOOR));
    }

    #[tokio::test]
    async fn test_read_and_wishlisted_books_are_never_recommended() {
        let store = Arc::new(MemoryStore::new());
        let read_book = fixture_book("Read", "A", &["Mystery"], 4.9, 100);
        let wished_book = fixture_book("Wished", "B", &["Mystery"], 4.8, 100);
        let fresh_book = fixture_book("Fresh", "C", &["Mystery"], 4.7, 100);
        let history = ReadingHistory {
            read_ids: vec![read_book.id],
            wishlist_ids: vec![wished_book.id],
        };
        store.insert_books([read_book, wished_book, fresh_book]).await;
        let user = Uuid::new_v4();
        store.insert_history(user, history).await;

        let recs = recommend_for_user(
            store.clone(),
            store,
            user,
            DEFAULT_LIMIT,
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        let titles: Vec<&str> = recs.iter().map(|r| r.book.title.as_str()).collect();
        assert_eq!(titles, vec!["Fresh"]);
    }

    #[tokio::test]
    async fn test_recommendations_are_deterministic() {
        let store = Arc::new(MemoryStore::new());
        let read_book = fixture_book("Read", "Favorite", &["Mystery", "SciFi"], 4.0, 10);
        let history = ReadingHistory {
            read_ids: vec![read_book.id],
            wishlist_ids: vec![],
        };
        store.insert_book(read_book).await;
        store
            .insert_books((0..20u32).map(|i| {
                fixture_book(
                    &format!("Candidate {}", i),
                    "Someone",
                    &["Mystery"],
                    4.0 + f64::from(i % 10) / 10.0,
                    i * 7,
                )
            }))
            .await;
        let user = Uuid::new_v4();
        store.insert_history(user, history).await;

        let first = recommend_for_user(
            store.clone(),
            store.clone(),
            user,
            DEFAULT_LIMIT,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        let second = recommend_for_user(
            store.clone(),
            store,
            user,
            DEFAULT_LIMIT,
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), DEFAULT_LIMIT);
    }

    #[tokio::test]
    async fn test_slow_store_degrades_to_empty_list() {
        struct SlowHistoryStore;

        #[async_trait::async_trait]
        impl HistoryStore for SlowHistoryStore {
            async fn fetch_history(&self, _user_id: Uuid) -> AppResult<Option<ReadingHistory>> {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Some(ReadingHistory::default()))
            }
        }

        let catalog = Arc::new(MemoryStore::new());
        let recs = recommend_for_user(
            catalog,
            Arc::new(SlowHistoryStore),
            Uuid::new_v4(),
            DEFAULT_LIMIT,
            Duration::from_millis(20),
        )
        .await
        .unwrap();

        assert!(recs.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_surfaced_not_swallowed() {
        let mut history = MockHistoryStore::new();
        history
            .expect_fetch_history()
            .returning(|_| Ok(Some(ReadingHistory::default())));

        let mut catalog = MockCatalogStore::new();
        catalog
            .expect_find_by_ids()
            .returning(|_| Ok(Vec::new()));
        catalog
            .expect_find_recommendable()
            .returning(|_, _, _, _| Err(AppError::Database(sqlx::Error::PoolTimedOut)));

        let result = recommend_for_user(
            Arc::new(catalog),
            Arc::new(history),
            Uuid::new_v4(),
            DEFAULT_LIMIT,
            Duration::from_secs(5),
        )
        .await;

        assert!(matches!(result, Err(AppError::Database(_))));
    }
}
