//! # Optimistic Mutator
//!
//! Apply first, ask the remote second, then settle.
//!
//! ## Flow
//!
//! 1. Not signed in: nothing happens, the user is asked to sign in
//! 2. Wait for the key's turn in the [`MutationSerializer`]
//! 3. Remember the movie's exact prior state
//! 4. Apply the change to the store, the user sees it immediately
//! 5. Send it to the remote, the only await on the way
//! 6. Success: keep it, tell the user
//! 7. Rejected: put the prior state back exactly, tell the user, sign out if the token expired
//! 8. Unreachable: keep it anyway, tell the user it is only saved locally
//! 9. Hand the key to the next queued request, which starts from whatever the store now holds
//! 10. Queue a durable write of what was kept; nobody waits on it
//!
//! Ratings are validated before step 1 touches anything.
//!
//! ## Notes
//!
//! Nothing here returns an error. Callers get a [`Resolution`] and the user gets exactly one notification
//! per call. Steps 2 onwards run on their own task, so a mutation still settles if its caller stops
//! caring about the result; the store is shared, so any view looking at it later sees the settled state.
//!
//! A revert is dropped if the store was cleared in the meantime, so a logout is never undone.
use std::sync::Arc;

use tracing::{Instrument, info, instrument, warn};

use crate::{
    error::ValidationError,
    gateway::{MutationRequest, Outcome, RejectReason, RemoteGateway},
    model::{CollectionKind, MovieId, MutationStatus, Operation, PendingMutation, RatingValue},
    notify::{Notification, NotificationSink, Titles, Verdict, render},
    persistence::PersistenceBridge,
    serializer::{Admission, MutationSerializer},
    session::SessionProvider,
    store::CollectionStore,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Settled(PendingMutation),
    AuthRequired,
    Invalid(ValidationError),
}

impl Resolution {
    pub fn status(&self) -> Option<MutationStatus> {
        match self {
            Resolution::Settled(mutation) => Some(mutation.status()),
            Resolution::AuthRequired | Resolution::Invalid(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Intent {
    Toggle,
    Rate(RatingValue),
    Unrate,
}

#[derive(Clone)]
pub struct OptimisticMutator {
    store: Arc<CollectionStore>,
    serializer: MutationSerializer,
    gateway: Arc<dyn RemoteGateway>,
    session: Arc<dyn SessionProvider>,
    persistence: Arc<PersistenceBridge>,
    sink: Arc<dyn NotificationSink>,
    titles: Arc<Titles>,
}

impl OptimisticMutator {
    pub fn new(
        store: Arc<CollectionStore>,
        gateway: Arc<dyn RemoteGateway>,
        session: Arc<dyn SessionProvider>,
        persistence: Arc<PersistenceBridge>,
        sink: Arc<dyn NotificationSink>,
        titles: Arc<Titles>,
    ) -> Self {
        Self {
            store,
            serializer: MutationSerializer::new(),
            gateway,
            session,
            persistence,
            sink,
            titles,
        }
    }

    pub fn store(&self) -> &CollectionStore {
        &self.store
    }

    pub fn titles(&self) -> &Titles {
        &self.titles
    }

    pub fn rating(&self, movie_id: MovieId) -> Option<RatingValue> {
        self.store.rating(movie_id)
    }

    pub fn is_pending(&self, kind: CollectionKind, movie_id: MovieId) -> bool {
        self.serializer.is_busy(kind, movie_id)
    }

    pub async fn toggle(&self, kind: CollectionKind, movie_id: MovieId) -> Resolution {
        if !kind.is_membership() {
            return self.invalid(kind, movie_id, ValidationError::NotToggleable(kind));
        }

        self.submit(kind, movie_id, Intent::Toggle).await
    }

    pub async fn set_rating(&self, movie_id: MovieId, value: f64) -> Resolution {
        match RatingValue::new(value) {
            Ok(rating) => {
                self.submit(CollectionKind::Rating, movie_id, Intent::Rate(rating))
                    .await
            }
            Err(e) => self.invalid(CollectionKind::Rating, movie_id, e),
        }
    }

    pub async fn clear_rating(&self, movie_id: MovieId) -> Resolution {
        self.submit(CollectionKind::Rating, movie_id, Intent::Unrate)
            .await
    }

    /// Empties every collection, mirrors that to storage and ends the session.
    pub async fn logout(&self) {
        self.end_session();
        self.persistence.flush_all().await;
    }

    /// Waits until every change kept so far has reached durable storage, or failed to.
    pub async fn persisted(&self) {
        self.persistence.settled().await;
    }

    fn end_session(&self) {
        self.session.clear();
        self.store.clear();

        info!("Signed out, collections cleared");
    }

    /// Takes the key's place in line right away, then settles on its own task.
    async fn submit(&self, kind: CollectionKind, movie_id: MovieId, intent: Intent) -> Resolution {
        if !self.session.is_authenticated() {
            return self.auth_required(kind, movie_id);
        }

        let admission = self.serializer.admit(kind, movie_id);
        let mutator = self.clone();

        let settling = tokio::spawn(
            async move { mutator.mutate(kind, movie_id, intent, admission).await }
                .in_current_span(),
        );

        match settling.await {
            Ok(resolution) => resolution,
            // the task is never aborted, so this is a panic
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        }
    }

    #[instrument(level = "debug", skip(self, admission), fields(kind = %kind))]
    async fn mutate(
        &self,
        kind: CollectionKind,
        movie_id: MovieId,
        intent: Intent,
        admission: Admission,
    ) -> Resolution {
        let ticket = admission.ready().await;

        // the session may have ended while this request was queued
        let Some(credential) = self.session.credential() else {
            return self.auth_required(kind, movie_id);
        };

        let operation = match intent {
            Intent::Toggle if self.store.contains(kind, movie_id) => Operation::Remove,
            Intent::Toggle => Operation::Add,
            Intent::Rate(rating) => Operation::SetRating(rating),
            Intent::Unrate => Operation::Remove,
        };

        let previous = self.store.entry(kind, movie_id);
        self.store.apply(kind, movie_id, operation);
        let mut mutation = PendingMutation::new(kind, movie_id, operation, previous);

        let request = MutationRequest {
            kind,
            movie_id,
            operation,
        };

        let (verdict, dirty): (Verdict, Vec<CollectionKind>) =
            match self.gateway.request(&request, &credential).await {
                Outcome::Success(_) => {
                    mutation.settle(MutationStatus::Confirmed);

                    (Verdict::Confirmed, vec![kind])
                }
                Outcome::Rejected(rejection) => {
                    self.store.restore_entry(mutation.previous);
                    mutation.settle(MutationStatus::RevertedOnReject);

                    warn!(
                        %kind,
                        movie_id,
                        %operation,
                        reason = ?rejection.reason,
                        "Mutation rejected, reverted: {}",
                        rejection.message
                    );

                    if rejection.reason == RejectReason::AuthExpired {
                        self.end_session();
                        (Verdict::Reverted(rejection.reason), CollectionKind::ALL.to_vec())
                    } else {
                        (Verdict::Reverted(rejection.reason), Vec::new())
                    }
                }
                Outcome::Unreachable(reason) => {
                    mutation.settle(MutationStatus::AcceptedOffline);

                    warn!(%kind, movie_id, %operation, "Remote unreachable, kept locally: {reason}");

                    (Verdict::AcceptedOffline, vec![kind])
                }
            };

        self.emit(kind, movie_id, Some(operation), verdict);
        drop(ticket);

        for kind in dirty {
            self.persistence.schedule(kind);
        }

        Resolution::Settled(mutation)
    }

    fn auth_required(&self, kind: CollectionKind, movie_id: MovieId) -> Resolution {
        self.emit(kind, movie_id, None, Verdict::AuthRequired);

        Resolution::AuthRequired
    }

    fn invalid(&self, kind: CollectionKind, movie_id: MovieId, e: ValidationError) -> Resolution {
        self.emit(kind, movie_id, None, Verdict::Invalid(e.clone()));

        Resolution::Invalid(e)
    }

    fn emit(
        &self,
        kind: CollectionKind,
        movie_id: MovieId,
        operation: Option<Operation>,
        verdict: Verdict,
    ) {
        let (level, message) = render(kind, operation, &verdict, &self.titles.title(movie_id));

        self.sink.notify(Notification {
            kind,
            movie_id,
            operation,
            verdict,
            level,
            message,
        });
    }
}
