//! # Notifications
//!
//! Every finished mutation ends in exactly one message for the user, and so does every request that
//! was turned away locally (not signed in, bad rating).
//!
//! [`render`] is the whole mapping. Sinks only deliver.
use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    error::ValidationError,
    gateway::RejectReason,
    model::{CollectionKind, MovieId, Operation},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Confirmed,
    AcceptedOffline,
    Reverted(RejectReason),
    AuthRequired,
    Invalid(ValidationError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: CollectionKind,
    pub movie_id: MovieId,
    pub operation: Option<Operation>,
    pub verdict: Verdict,
    pub level: Level,
    pub message: String,
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

pub fn render(
    kind: CollectionKind,
    operation: Option<Operation>,
    verdict: &Verdict,
    title: &str,
) -> (Level, String) {
    let label = kind.label();

    match verdict {
        Verdict::Confirmed => (Level::Success, done(kind, operation, title)),
        Verdict::AcceptedOffline => (
            Level::Info,
            format!(
                "{} (saved offline, will sync later)",
                done(kind, operation, title)
            ),
        ),
        Verdict::Reverted(RejectReason::AuthExpired) => (
            Level::Error,
            "Your session has expired. Please sign in again.".to_string(),
        ),
        Verdict::Reverted(_) => {
            let attempt = match (kind, operation) {
                (CollectionKind::Rating, Some(Operation::Remove)) => {
                    format!("remove your rating for \"{title}\"")
                }
                (_, Some(Operation::SetRating(_))) => format!("rate \"{title}\""),
                (_, Some(Operation::Remove)) => format!("remove \"{title}\" from {label}"),
                _ => format!("add \"{title}\" to {label}"),
            };

            (
                Level::Error,
                format!("Could not {attempt}. Please try again."),
            )
        }
        Verdict::AuthRequired => (
            Level::Info,
            format!("Please sign in to manage your {label}"),
        ),
        Verdict::Invalid(e) => (Level::Error, e.to_string()),
    }
}

fn done(kind: CollectionKind, operation: Option<Operation>, title: &str) -> String {
    let label = kind.label();

    match (kind, operation) {
        (_, Some(Operation::SetRating(rating))) => format!("You rated \"{title}\" {rating} stars"),
        (CollectionKind::Rating, _) => format!("Rating for \"{title}\" removed"),
        (_, Some(Operation::Remove)) => format!("\"{title}\" removed from {label}"),
        _ => format!("\"{title}\" added to {label}"),
    }
}

/// Movie titles the UI has shown, so messages can name the movie.
#[derive(Debug, Default)]
pub struct Titles {
    inner: RwLock<HashMap<MovieId, String>>,
}

impl Titles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, movie_id: MovieId, title: impl Into<String>) {
        self.inner.write().insert(movie_id, title.into());
    }

    pub fn title(&self, movie_id: MovieId) -> String {
        self.inner
            .read()
            .get(&movie_id)
            .cloned()
            .unwrap_or_else(|| format!("movie #{movie_id}"))
    }
}

pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, notification: Notification) {
        let Notification {
            kind,
            movie_id,
            level,
            message,
            ..
        } = notification;

        match level {
            Level::Error => warn!(%kind, movie_id, "{message}"),
            Level::Success | Level::Info => info!(%kind, movie_id, "{message}"),
        }
    }
}

/// Hands notifications to whatever drives the UI.
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();

        (Self { sender }, receiver)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) {
        if self.sender.send(notification).is_err() {
            debug!("Notification receiver dropped");
        }
    }
}
