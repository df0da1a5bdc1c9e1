use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::VecDeque;

use super::{JokeId, MAX_RATING, MIN_RATING};

/// Number of recent ratings kept per user
pub const HISTORY_CAPACITY: usize = 3;

/// Midpoint of the rating scale; ratings above it push the bias positive
const RATING_MIDPOINT: f64 = (MIN_RATING + MAX_RATING) / 2.0;

/// Stretch factor from the [0, 10] input scale onto the signed [-10, 10] scale
const BIAS_SCALE: f64 = 2.0;

/// A single rating a user gave to a joke
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RatingEvent {
    pub joke_id: JokeId,
    pub rating: f64,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl RatingEvent {
    pub fn new(joke_id: JokeId, rating: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            joke_id,
            rating,
            timestamp,
        }
    }
}

/// Parses an RFC 3339 timestamp, or an ISO 8601 one without offset read as UTC
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| raw.parse::<NaiveDateTime>().ok().map(|naive| naive.and_utc()))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}

/// Most recent ratings of one user, oldest first
///
/// Holds at most [`HISTORY_CAPACITY`] events. Pushing onto a full history
/// evicts the oldest event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<RatingEvent>", into = "Vec<RatingEvent>")]
pub struct UserHistory {
    events: VecDeque<RatingEvent>,
}

impl UserHistory {
    pub fn new() -> Self {
        Self {
            events: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    /// Appends an event, returning the evicted one if the history was full
    pub fn push(&mut self, event: RatingEvent) -> Option<RatingEvent> {
        let evicted = if self.events.len() >= HISTORY_CAPACITY {
            self.events.pop_front()
        } else {
            None
        };
        self.events.push_back(event);
        evicted
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RatingEvent> {
        self.events.iter()
    }

    pub fn to_vec(&self) -> Vec<RatingEvent> {
        self.events.iter().cloned().collect()
    }

    /// Mean of the stored ratings, `None` for an empty history
    pub fn average(&self) -> Option<f64> {
        if self.events.is_empty() {
            return None;
        }
        let sum: f64 = self.events.iter().map(|e| e.rating).sum();
        Some(sum / self.events.len() as f64)
    }

    /// Preference bias on the [-10, 10] scale
    ///
    /// Users who rate generously get a positive bias, harsh raters a negative
    /// one. An empty history has no bias.
    pub fn bias(&self) -> f64 {
        self.average()
            .map(|avg| (avg - RATING_MIDPOINT) * BIAS_SCALE)
            .unwrap_or(0.0)
    }
}

impl From<Vec<RatingEvent>> for UserHistory {
    /// Keeps only the most recent [`HISTORY_CAPACITY`] events
    fn from(events: Vec<RatingEvent>) -> Self {
        let mut history = UserHistory::new();
        for event in events {
            history.push(event);
        }
        history
    }
}

impl From<UserHistory> for Vec<RatingEvent> {
    fn from(history: UserHistory) -> Self {
        history.events.into_iter().collect()
    }
}
