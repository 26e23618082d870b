//! Optimistic favorites, watchlist and ratings for a movie catalog client.
//!
//!
//!
//! # General Flow
//! - UI calls [`OptimisticMutator::toggle`], [`OptimisticMutator::set_rating`] or [`OptimisticMutator::clear_rating`]
//! - The change shows up in the [`CollectionStore`] right away
//! - One request goes to the remote collection service in the background
//! - The remote's answer confirms the change, rolls it back exactly, or keeps it as saved offline
//! - Kept changes are mirrored into Redis, and read back on the next start
//! - Every call ends in exactly one user-facing [`Notification`]
//!
//!
//!
//! # Ordering
//!
//! **Goal**: Rapid clicks on one movie must behave like the same clicks made slowly.
//!
//! - Mutations are keyed by (collection, movie id)
//! - One mutation per key is in flight at a time, later ones queue in click order
//! - A queued mutation decides what to do only once it reaches the front, from the state the previous one left
//! - Different keys never wait on each other
//!
//!
//!
//! # Notes
//!
//! ## Rollback
//! A rejection restores the movie's exact prior entry, position in the list included, and nothing else.
//! Another movie's change still in flight in the same collection is left alone.
//!
//! ## Offline
//! When the remote can't be reached at all, the change stays. The user is told it is only saved locally. There is
//! no replay queue; the next session simply starts from what was persisted.
//!
//!
//!
//! # Setup
//!
//! Environment.
//! ```sh
//! SHELF_API_URL=http://localhost:5000/api
//! SHELF_REDIS_URL=redis://127.0.0.1:6379
//! SHELF_TIMEOUT_MS=5000
//! SHELF_TOKEN=...
//! ```
//!
//! The token can also be mounted as `/run/secrets/SHELF_TOKEN`.
//!
//! Logs.
//! ```sh
//! RUST_LOG=shelf=debug shelf list
//! ```
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod error;
pub mod gateway;
pub mod model;
pub mod mutator;
pub mod notify;
pub mod persistence;
pub mod serializer;
pub mod session;
pub mod state;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{ConfigError, ShelfError, StorageError, ValidationError};
pub use gateway::{HttpGateway, MutationRequest, Outcome, RejectReason, Rejection, RemoteGateway};
pub use model::{CollectionItem, CollectionKind, MovieId, MutationStatus, Operation, RatingValue};
pub use mutator::{OptimisticMutator, Resolution};
pub use notify::{ChannelSink, Level, LogSink, Notification, NotificationSink, Titles, Verdict};
pub use persistence::{DurableStore, MemoryStore, PersistenceBridge, RedisStore};
pub use session::{Credential, SessionProvider, SharedSession};
pub use state::Shelf;
pub use store::CollectionStore;

/// Installs the `RUST_LOG` driven subscriber. Safe to call more than once.
pub fn init_tracing() {
    let _ = fmt().with_env_filter(EnvFilter::from_default_env()).try_init();
}
