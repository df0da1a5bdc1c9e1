use std::sync::Arc;

use tokio::sync::{RwLock, Semaphore};

use crate::{
    error::{AppError, AppResult},
    models::{
        round_to, JokeId, Prediction, Recommendation, RecommendationSet, UserId, MAX_PREDICTION,
        MIN_PREDICTION,
    },
    services::{catalog::JokeCatalog, providers::RatingPredictor},
    store::RatingStore,
};

/// Share of the user bias added to the model estimate
pub const BIAS_WEIGHT: f64 = 0.3;

/// Recommendations returned when the caller does not ask for a count
pub const DEFAULT_TOP_N: usize = 5;

/// Model calls in flight at once while ranking the catalog
const MAX_CONCURRENT_ESTIMATES: usize = 16;

/// Applies the user bias to a model estimate and keeps the result in
/// [-10, 10]
pub fn adjust_score(base: f64, bias: f64) -> f64 {
    (base + bias * BIAS_WEIGHT).clamp(MIN_PREDICTION, MAX_PREDICTION)
}

/// Bias-adjusted predictions and rankings
///
/// Reads the user bias from the rating store and the raw estimate from the
/// model. Either the model or the catalog may be missing when its file could
/// not be loaded at startup; calls that need them report so on every request.
#[derive(Clone)]
pub struct ScoringService {
    store: Arc<RwLock<RatingStore>>,
    predictor: Option<Arc<dyn RatingPredictor>>,
    catalog: Option<Arc<JokeCatalog>>,
}

impl ScoringService {
    pub fn new(
        store: Arc<RwLock<RatingStore>>,
        predictor: Option<Arc<dyn RatingPredictor>>,
        catalog: Option<Arc<JokeCatalog>>,
    ) -> Self {
        Self {
            store,
            predictor,
            catalog,
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.predictor.is_some()
    }

    pub fn catalog(&self) -> Option<&JokeCatalog> {
        self.catalog.as_deref()
    }

    /// Predicts how much a user will like a joke
    pub async fn predict(&self, user_id: UserId, joke_id: JokeId) -> AppResult<Prediction> {
        let predictor = self.predictor.as_deref().ok_or(AppError::ModelUnavailable)?;

        let (bias, user_ratings_count) = self.user_profile(user_id).await;
        let base = estimate(predictor, user_id, joke_id).await?;

        Ok(Prediction {
            user_id,
            joke_id,
            base,
            bias,
            adjusted: adjust_score(base, bias),
            user_ratings_count,
        })
    }

    /// Ranks every joke in the catalog for a user and returns the best `top_n`
    ///
    /// Jokes the model fails to score are skipped. Ties keep catalog order.
    pub async fn recommend(&self, user_id: UserId, top_n: usize) -> AppResult<RecommendationSet> {
        let (predictor, catalog) = match (&self.predictor, self.catalog.as_deref()) {
            (Some(predictor), Some(catalog)) => (predictor, catalog),
            _ => {
                return Err(AppError::DataUnavailable(
                    "model or joke catalog not loaded".to_string(),
                ))
            }
        };

        let (user_bias, user_ratings_count) = self.user_profile(user_id).await;

        // One task per joke; handles are awaited in catalog order so ties stay stable
        let permits = Arc::new(Semaphore::new(MAX_CONCURRENT_ESTIMATES));
        let mut tasks = Vec::with_capacity(catalog.len());
        for joke in catalog.iter() {
            let predictor = predictor.clone();
            let permits = permits.clone();
            let joke_id = joke.joke_id;
            let task = tokio::spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| AppError::Internal(e.to_string()))?;
                estimate(predictor.as_ref(), user_id, joke_id).await
            });
            tasks.push((joke, task));
        }

        let mut recommendations = Vec::with_capacity(catalog.len());
        let mut skipped = 0usize;
        for (joke, task) in tasks {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => Err(AppError::Internal(e.to_string())),
            };
            match result {
                Ok(base) => recommendations.push(Recommendation {
                    joke_id: joke.joke_id,
                    predicted_rating: round_to(adjust_score(base, user_bias), 3),
                    joke_text: joke.joke_text.clone(),
                }),
                Err(e) => {
                    skipped += 1;
                    tracing::debug!(user_id, joke_id = joke.joke_id, error = %e, "Skipping joke");
                }
            }
        }

        let total_jokes_evaluated = recommendations.len();
        if skipped > 0 {
            tracing::warn!(
                user_id,
                model = predictor.name(),
                evaluated = total_jokes_evaluated,
                skipped,
                "Some jokes could not be scored"
            );
        }

        // sort_by is stable, so equal scores stay in catalog order
        recommendations.sort_by(|a, b| b.predicted_rating.total_cmp(&a.predicted_rating));
        recommendations.truncate(top_n);

        tracing::info!(
            user_id,
            returned = recommendations.len(),
            evaluated = total_jokes_evaluated,
            "Recommendations computed"
        );

        Ok(RecommendationSet {
            user_id,
            recommendations,
            user_bias,
            user_ratings_count,
            total_jokes_evaluated,
        })
    }

    async fn user_profile(&self, user_id: UserId) -> (f64, usize) {
        let store = self.store.read().await;
        (store.bias_of(user_id), store.ratings_count(user_id))
    }
}

/// Model estimate for one pair; a non-finite value counts as a failure
async fn estimate(
    predictor: &dyn RatingPredictor,
    user_id: UserId,
    joke_id: JokeId,
) -> AppResult<f64> {
    let base = predictor.estimate(user_id, joke_id).await?;
    if !base.is_finite() {
        return Err(AppError::Prediction(format!(
            "{} model returned a non-finite estimate for joke {}",
            predictor.name(),
            joke_id
        )));
    }
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Joke;
    use crate::services::providers::MockRatingPredictor;
    use chrono::Utc;
    use tempfile::TempDir;

    fn constant_model(value: f64) -> Arc<dyn RatingPredictor> {
        let mut mock = MockRatingPredictor::new();
        mock.expect_estimate().returning(move |_, _| Ok(value));
        mock.expect_name().return_const("mock");
        Arc::new(mock)
    }

    fn catalog_of(ids: &[JokeId]) -> Arc<JokeCatalog> {
        Arc::new(JokeCatalog::new(
            ids.iter().map(|&id| Joke::new(id, format!("joke {}", id))),
        ))
    }

    fn empty_store(dir: &TempDir) -> Arc<RwLock<RatingStore>> {
        Arc::new(RwLock::new(RatingStore::empty(
            dir.path().join("user_ratings.json"),
        )))
    }

    async fn rate_all(store: &Arc<RwLock<RatingStore>>, user_id: UserId, ratings: &[f64]) {
        let mut store = store.write().await;
        for (i, rating) in ratings.iter().enumerate() {
            store
                .record(user_id, i as JokeId, *rating, Utc::now())
                .await
                .unwrap();
        }
    }

    #[test]
    fn test_adjust_score_clamps() {
        assert_eq!(adjust_score(4.0, 0.0), 4.0);
        assert!((adjust_score(4.0, 10.0) - 7.0).abs() < 1e-9);
        assert_eq!(adjust_score(9.5, 10.0), 10.0);
        assert_eq!(adjust_score(-50.0, 0.0), -10.0);
        assert_eq!(adjust_score(1e9, -10.0), 10.0);
    }

    #[tokio::test]
    async fn test_predict_unknown_user_has_no_bias() {
        let dir = TempDir::new().unwrap();
        let service = ScoringService::new(empty_store(&dir), Some(constant_model(4.0)), None);

        let prediction = service.predict(123, 5).await.unwrap();
        assert_eq!(prediction.base, 4.0);
        assert_eq!(prediction.bias, 0.0);
        assert_eq!(prediction.adjusted, 4.0);
        assert_eq!(prediction.user_ratings_count, 0);
    }

    #[tokio::test]
    async fn test_predict_applies_user_bias() {
        let dir = TempDir::new().unwrap();
        let store = empty_store(&dir);
        rate_all(&store, 42, &[10.0, 10.0, 10.0]).await;
        let service = ScoringService::new(store, Some(constant_model(4.0)), None);

        let prediction = service.predict(42, 5).await.unwrap();
        assert_eq!(prediction.bias, 10.0);
        assert!((prediction.adjusted - 7.0).abs() < 1e-9);
        assert_eq!(prediction.user_ratings_count, 3);
    }

    #[tokio::test]
    async fn test_predict_stays_in_range_for_extreme_estimates() {
        let dir = TempDir::new().unwrap();
        let store = empty_store(&dir);
        rate_all(&store, 1, &[0.0]).await;

        for value in [-1e6, -10.0, 0.0, 10.0, 1e6] {
            let service = ScoringService::new(store.clone(), Some(constant_model(value)), None);
            let adjusted = service.predict(1, 1).await.unwrap().adjusted;
            assert!((MIN_PREDICTION..=MAX_PREDICTION).contains(&adjusted));
        }
    }

    #[tokio::test]
    async fn test_predict_without_model() {
        let dir = TempDir::new().unwrap();
        let service = ScoringService::new(empty_store(&dir), None, Some(catalog_of(&[1])));

        assert!(!service.model_loaded());
        let result = service.predict(1, 1).await;
        assert!(matches!(result, Err(AppError::ModelUnavailable)));
    }

    #[tokio::test]
    async fn test_predict_rejects_non_finite_estimate() {
        let dir = TempDir::new().unwrap();
        let service = ScoringService::new(empty_store(&dir), Some(constant_model(f64::NAN)), None);

        let result = service.predict(1, 1).await;
        assert!(matches!(result, Err(AppError::Prediction(_))));
    }

    #[tokio::test]
    async fn test_recommend_ranks_and_skips_failures() {
        let dir = TempDir::new().unwrap();
        let mut mock = MockRatingPredictor::new();
        mock.expect_estimate().returning(|_, joke_id| match joke_id {
            4 => Err(AppError::Prediction("no factors".to_string())),
            _ => Ok(joke_id as f64),
        });
        mock.expect_name().return_const("mock");

        let service = ScoringService::new(
            empty_store(&dir),
            Some(Arc::new(mock)),
            Some(catalog_of(&[1, 2, 3, 4, 5, 6, 7, 8])),
        );

        let result = service.recommend(9, 5).await.unwrap();
        let ids: Vec<JokeId> = result.recommendations.iter().map(|r| r.joke_id).collect();
        assert_eq!(ids, vec![8, 7, 6, 5, 3]);
        assert_eq!(result.total_jokes_evaluated, 7);
        assert_eq!(result.recommendations[0].joke_text, "joke 8");
        assert!(result
            .recommendations
            .windows(2)
            .all(|w| w[0].predicted_rating >= w[1].predicted_rating));
    }

    #[tokio::test]
    async fn test_recommend_ties_keep_catalog_order() {
        let dir = TempDir::new().unwrap();
        let service = ScoringService::new(
            empty_store(&dir),
            Some(constant_model(2.5)),
            Some(catalog_of(&[30, 10, 20])),
        );

        let result = service.recommend(1, 10).await.unwrap();
        let ids: Vec<JokeId> = result.recommendations.iter().map(|r| r.joke_id).collect();
        assert_eq!(ids, vec![30, 10, 20]);
    }

    #[tokio::test]
    async fn test_recommend_zero_items() {
        let dir = TempDir::new().unwrap();
        let service = ScoringService::new(
            empty_store(&dir),
            Some(constant_model(1.0)),
            Some(catalog_of(&[1, 2])),
        );

        let result = service.recommend(1, 0).await.unwrap();
        assert!(result.recommendations.is_empty());
        assert_eq!(result.total_jokes_evaluated, 2);
    }

    #[tokio::test]
    async fn test_recommend_requires_model_and_catalog() {
        let dir = TempDir::new().unwrap();

        let no_catalog = ScoringService::new(empty_store(&dir), Some(constant_model(1.0)), None);
        assert!(matches!(
            no_catalog.recommend(1, 5).await,
            Err(AppError::DataUnavailable(_))
        ));

        let no_model = ScoringService::new(empty_store(&dir), None, Some(catalog_of(&[1])));
        assert!(matches!(
            no_model.recommend(1, 5).await,
            Err(AppError::DataUnavailable(_))
        ));
    }

    /// Model that takes a fixed time per call and scores jokes by id
    struct SlowModel {
        delay: std::time::Duration,
    }

    #[async_trait::async_trait]
    impl RatingPredictor for SlowModel {
        async fn estimate(&self, _user_id: UserId, joke_id: JokeId) -> AppResult<f64> {
            tokio::time::sleep(self.delay).await;
            Ok((joke_id % 3) as f64)
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_recommend_scores_jokes_concurrently() {
        let dir = TempDir::new().unwrap();
        let ids: Vec<JokeId> = (1..=20).collect();
        let service = ScoringService::new(
            empty_store(&dir),
            Some(Arc::new(SlowModel {
                delay: std::time::Duration::from_millis(50),
            })),
            Some(catalog_of(&ids)),
        );

        let started = std::time::Instant::now();
        let result = service.recommend(1, 5).await.unwrap();
        let elapsed = started.elapsed();

        assert!(
            elapsed < std::time::Duration::from_millis(500),
            "ranking took {:?}",
            elapsed
        );
        assert_eq!(result.total_jokes_evaluated, 20);

        // Score 2.0 belongs to ids 2, 5, 8, 11, 14, ...; ties keep catalog order
        let top: Vec<JokeId> = result.recommendations.iter().map(|r| r.joke_id).collect();
        assert_eq!(top, vec![2, 5, 8, 11, 14]);
    }
}
