//! # Models
//!
//! Everything a user can keep on their shelf.
//!
//! ## Collections
//! - Favorite, Watchlist: sets of movies, one entry per movie id, remembered with the time they were added
//! - Rating: movie id to a rating between 0.5 and 10 in half steps
//!
//! Ratings are kept as a count of half steps so two equal ratings always compare equal and a restored
//! rating is exactly the one that was replaced.
use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::{error::ValidationError, store::EntrySnapshot};

pub type MovieId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Favorite,
    Watchlist,
    Rating,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 3] = [Self::Favorite, Self::Watchlist, Self::Rating];

    /// Key the collection is mirrored under in durable storage.
    pub fn storage_key(self) -> &'static str {
        match self {
            Self::Favorite => "favorites",
            Self::Watchlist => "watchlist",
            Self::Rating => "ratings",
        }
    }

    /// Name used in user-facing messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::Favorite => "favorites",
            Self::Watchlist => "watchlist",
            Self::Rating => "ratings",
        }
    }

    pub fn is_membership(self) -> bool {
        !matches!(self, Self::Rating)
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Favorite => "favorite",
            Self::Watchlist => "watchlist",
            Self::Rating => "rating",
        };

        f.write_str(name)
    }
}

impl FromStr for CollectionKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "favorite" | "favorites" => Ok(Self::Favorite),
            "watchlist" => Ok(Self::Watchlist),
            "rating" | "ratings" => Ok(Self::Rating),
            other => Err(ValidationError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionItem {
    pub movie_id: MovieId,
    pub added_at: DateTime<Utc>,
}

impl CollectionItem {
    pub fn now(movie_id: MovieId) -> Self {
        Self {
            movie_id,
            added_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RatingValue {
    half_steps: u8,
}

impl RatingValue {
    pub const MIN: f64 = 0.5;
    pub const MAX: f64 = 10.0;
    pub const STEP: f64 = 0.5;

    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::NotFinite);
        }

        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(ValidationError::OutOfRange(value));
        }

        // dividing by 0.5 is exact in binary, so any fraction left means an off-step value
        let half_steps = value / Self::STEP;
        if half_steps.fract() != 0.0 {
            return Err(ValidationError::OffStep(value));
        }

        Ok(Self {
            half_steps: half_steps as u8,
        })
    }

    pub fn value(self) -> f64 {
        f64::from(self.half_steps) * Self::STEP
    }
}

impl TryFrom<f64> for RatingValue {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for RatingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

impl Serialize for RatingValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.value())
    }
}

impl<'de> Deserialize<'de> for RatingValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;

        Self::new(value).map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatedMovie {
    pub movie_id: MovieId,
    pub rating: RatingValue,
}

/// Startup state read back from durable storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hydrated {
    pub favorites: Vec<CollectionItem>,
    pub watchlist: Vec<CollectionItem>,
    pub ratings: Vec<RatedMovie>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Remove,
    SetRating(RatingValue),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => f.write_str("add"),
            Self::Remove => f.write_str("remove"),
            Self::SetRating(rating) => write!(f, "rate {rating}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    Pending,
    Confirmed,
    RevertedOnReject,
    AcceptedOffline,
}

impl MutationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// An optimistic change that has been applied locally and sent to the remote.
///
/// Created `Pending`, settled exactly once into one of the terminal states.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMutation {
    pub kind: CollectionKind,
    pub movie_id: MovieId,
    pub operation: Operation,
    pub previous: EntrySnapshot,
    status: MutationStatus,
}

impl PendingMutation {
    pub fn new(
        kind: CollectionKind,
        movie_id: MovieId,
        operation: Operation,
        previous: EntrySnapshot,
    ) -> Self {
        Self {
            kind,
            movie_id,
            operation,
            previous,
            status: MutationStatus::Pending,
        }
    }

    pub fn status(&self) -> MutationStatus {
        self.status
    }

    pub(crate) fn settle(&mut self, status: MutationStatus) {
        debug_assert!(!self.status.is_terminal(), "mutation settled twice");
        debug_assert!(status.is_terminal(), "mutation cannot return to pending");

        self.status = status;
    }
}
