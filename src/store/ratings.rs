use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::{
    error::{AppError, AppResult},
    models::{JokeId, RatingEvent, RecordedRating, UserHistory, UserId, MAX_RATING, MIN_RATING},
};

/// Recent ratings of every user, backed by a JSON file
///
/// The whole set of histories is written to disk after every accepted rating
/// and read back once at startup.
#[derive(Debug)]
pub struct RatingStore {
    path: PathBuf,
    histories: BTreeMap<UserId, UserHistory>,
}

impl RatingStore {
    /// Creates an empty store that persists to `path`
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            histories: BTreeMap::new(),
        }
    }

    /// Restores the store from `path`
    ///
    /// A missing file starts an empty store. An unreadable or corrupt file is
    /// logged and also starts an empty store; the next successful write
    /// replaces it.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        match Self::read_histories(&path).await {
            Ok(Some(histories)) => {
                tracing::info!(
                    path = %path.display(),
                    users = histories.len(),
                    "Loaded user ratings"
                );
                Self { path, histories }
            }
            Ok(None) => {
                tracing::info!(path = %path.display(), "No ratings file found, starting empty");
                Self::empty(path)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to load user ratings, starting empty"
                );
                Self::empty(path)
            }
        }
    }

    async fn read_histories(path: &Path) -> AppResult<Option<BTreeMap<UserId, UserHistory>>> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let histories: BTreeMap<UserId, UserHistory> = serde_json::from_str(&contents)?;
        Ok(Some(histories))
    }

    /// Appends a rating to the user's history and writes the store to disk
    ///
    /// Rejects ratings outside [0, 10]. A failed write is logged but does not
    /// fail the call; the in-memory state stays authoritative until the next
    /// successful write.
    pub async fn record(
        &mut self,
        user_id: UserId,
        joke_id: JokeId,
        rating: f64,
        timestamp: DateTime<Utc>,
    ) -> AppResult<RecordedRating> {
        validate_rating(rating)?;

        let event = RatingEvent::new(joke_id, rating, timestamp);
        let history = self.histories.entry(user_id).or_insert_with(UserHistory::new);
        if let Some(evicted) = history.push(event.clone()) {
            tracing::debug!(
                user_id,
                evicted_joke_id = evicted.joke_id,
                "Evicted oldest rating"
            );
        }
        let total_ratings = history.len();

        if let Err(e) = self.persist().await {
            tracing::error!(
                path = %self.path.display(),
                error = %e,
                "Failed to save user ratings"
            );
        }

        Ok(RecordedRating {
            event,
            total_ratings,
        })
    }

    /// Overwrites the ratings file with the complete current state
    pub async fn persist(&self) -> AppResult<()> {
        let json = serde_json::to_string_pretty(&self.histories)?;
        tokio::fs::write(&self.path, json).await?;
        tracing::debug!(path = %self.path.display(), users = self.histories.len(), "Saved user ratings");
        Ok(())
    }

    /// Recent ratings of a user, oldest first; empty for unknown users
    pub fn history_of(&self, user_id: UserId) -> Vec<RatingEvent> {
        self.histories
            .get(&user_id)
            .map(UserHistory::to_vec)
            .unwrap_or_default()
    }

    /// Preference bias derived from the user's recent ratings
    pub fn bias_of(&self, user_id: UserId) -> f64 {
        self.histories
            .get(&user_id)
            .map(UserHistory::bias)
            .unwrap_or(0.0)
    }

    /// Mean of the user's recent ratings
    pub fn average_of(&self, user_id: UserId) -> Option<f64> {
        self.histories.get(&user_id).and_then(UserHistory::average)
    }

    pub fn ratings_count(&self, user_id: UserId) -> usize {
        self.histories.get(&user_id).map_or(0, UserHistory::len)
    }

    pub fn contains_user(&self, user_id: UserId) -> bool {
        self.histories.contains_key(&user_id)
    }

    pub fn user_count(&self) -> usize {
        self.histories.len()
    }

    pub fn total_ratings(&self) -> usize {
        self.histories.values().map(UserHistory::len).sum()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn validate_rating(rating: f64) -> AppResult<()> {
    if !rating.is_finite() || !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(AppError::InvalidInput(format!(
            "rating must be between {} and {}",
            MIN_RATING, MAX_RATING
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HISTORY_CAPACITY;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> RatingStore {
        RatingStore::empty(dir.path().join("user_ratings.json"))
    }

    fn joke_ids(events: &[RatingEvent]) -> Vec<JokeId> {
        events.iter().map(|e| e.joke_id).collect()
    }

    #[tokio::test]
    async fn test_record_keeps_last_three_ratings() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);

        for (joke_id, rating) in [(7, 9.0), (8, 2.0), (9, 7.0)] {
            store.record(42, joke_id, rating, Utc::now()).await.unwrap();
        }
        assert_eq!(store.history_of(42).len(), 3);
        assert!((store.bias_of(42) - 2.0).abs() < 1e-9);

        let recorded = store.record(42, 10, 0.0, Utc::now()).await.unwrap();
        assert_eq!(recorded.total_ratings, HISTORY_CAPACITY);
        assert_eq!(joke_ids(&store.history_of(42)), vec![8, 9, 10]);
    }

    #[tokio::test]
    async fn test_record_rejects_out_of_range_ratings() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);

        for rating in [-0.1, 10.5, f64::NAN, f64::INFINITY] {
            let result = store.record(1, 1, rating, Utc::now()).await;
            assert!(matches!(result, Err(AppError::InvalidInput(_))));
        }
        assert!(!store.contains_user(1));
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_record_accepts_scale_bounds() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);

        tokio_test::assert_ok!(store.record(1, 1, 0.0, Utc::now()).await);
        tokio_test::assert_ok!(store.record(1, 2, 10.0, Utc::now()).await);
        assert_eq!(store.ratings_count(1), 2);
    }

    #[tokio::test]
    async fn test_unknown_user_has_no_history_or_bias() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert!(store.history_of(99).is_empty());
        assert_eq!(store.bias_of(99), 0.0);
        assert!(store.average_of(99).is_none());
        assert_eq!(store.ratings_count(99), 0);
    }

    #[tokio::test]
    async fn test_persist_and_reload_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);

        for joke_id in 1..=4 {
            store.record(1, joke_id, joke_id as f64, Utc::now()).await.unwrap();
        }
        store.record(2, 50, 6.5, Utc::now()).await.unwrap();

        let reloaded = RatingStore::load(store.path()).await;
        assert_eq!(reloaded.user_count(), 2);
        assert_eq!(reloaded.total_ratings(), 4);
        assert_eq!(reloaded.history_of(1), store.history_of(1));
        assert_eq!(reloaded.history_of(2), store.history_of(2));
        assert_eq!(joke_ids(&reloaded.history_of(1)), vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_load_missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = RatingStore::load(dir.path().join("absent.json")).await;
        assert_eq!(store.user_count(), 0);
    }

    #[tokio::test]
    async fn test_load_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("user_ratings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let mut store = RatingStore::load(&path).await;
        assert_eq!(store.user_count(), 0);

        // The next write replaces the corrupt file
        store.record(5, 1, 8.0, Utc::now()).await.unwrap();
        let reloaded = RatingStore::load(&path).await;
        assert_eq!(reloaded.ratings_count(5), 1);
    }

    #[tokio::test]
    async fn test_load_truncates_oversized_histories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("user_ratings.json");
        let contents = serde_json::json!({
            "3": [
                {"joke_id": 1, "rating": 1.0, "timestamp": "2024-01-01T00:00:00Z"},
                {"joke_id": 2, "rating": 2.0, "timestamp": "2024-01-01T00:01:00Z"},
                {"joke_id": 3, "rating": 3.0, "timestamp": "2024-01-01T00:02:00Z"},
                {"joke_id": 4, "rating": 4.0, "timestamp": "2024-01-01T00:03:00Z"}
            ]
        });
        std::fs::write(&path, contents.to_string()).unwrap();

        let store = RatingStore::load(&path).await;
        assert_eq!(joke_ids(&store.history_of(3)), vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_load_accepts_timestamps_without_offset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("user_ratings.json");
        let contents = r#"{
            "1": [
                {"joke_id": 5, "rating": 8, "timestamp": "2025-01-15T10:30:45.123456"},
                {"joke_id": 12, "rating": 3.5, "timestamp": "2025-01-15T10:31:02.654321"}
            ],
            "2": [
                {"joke_id": 7, "rating": 10.0, "timestamp": "2025-01-16T08:00:00"}
            ]
        }"#;
        std::fs::write(&path, contents).unwrap();

        let mut store = RatingStore::load(&path).await;
        assert_eq!(store.user_count(), 2);
        assert_eq!(joke_ids(&store.history_of(1)), vec![5, 12]);
        assert_eq!(store.average_of(1), Some(5.75));

        store.record(3, 1, 6.0, Utc::now()).await.unwrap();
        assert_eq!(store.user_count(), 3);

        let reloaded = RatingStore::load(&path).await;
        assert_eq!(reloaded.user_count(), 3);
        assert_eq!(reloaded.history_of(2), store.history_of(2));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_rating_in_memory() {
        let dir = TempDir::new().unwrap();
        let mut store = RatingStore::empty(dir.path().join("missing_dir").join("ratings.json"));

        let recorded = store.record(1, 1, 5.0, Utc::now()).await.unwrap();
        assert_eq!(recorded.total_ratings, 1);
        assert_eq!(store.ratings_count(1), 1);
        assert!(store.persist().await.is_err());
    }

    #[tokio::test]
    async fn test_file_uses_string_user_keys() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.record(42, 7, 9.0, Utc::now()).await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["42"][0]["joke_id"], 7);
        assert_eq!(json["42"][0]["rating"], 9.0);
    }
}
