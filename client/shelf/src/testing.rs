//! Fakes for exercising the mutator without a network or Redis.
use std::{collections::VecDeque, sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{Notify, oneshot};

use crate::{
    error::StorageError,
    gateway::{MutationRequest, Outcome, RejectReason, Rejection, RemoteGateway},
    mutator::OptimisticMutator,
    notify::{Notification, NotificationSink, Titles},
    persistence::{DurableStore, MemoryStore, PersistenceBridge},
    session::{Credential, SharedSession},
    store::CollectionStore,
};

enum Step {
    Now(Outcome),
    After(Duration, Outcome),
    Held(oneshot::Receiver<Outcome>),
}

/// Answers requests from a script, in call order. Unscripted calls succeed.
#[derive(Default)]
pub(crate) struct ScriptedGateway {
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<MutationRequest>>,
    started: Notify,
}

impl ScriptedGateway {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn answer(&self, outcome: Outcome) {
        self.steps.lock().push_back(Step::Now(outcome));
    }

    pub(crate) fn answer_after(&self, delay: Duration, outcome: Outcome) {
        self.steps.lock().push_back(Step::After(delay, outcome));
    }

    /// The matching call stays in flight until the returned sender fires.
    pub(crate) fn hold(&self) -> oneshot::Sender<Outcome> {
        let (sender, receiver) = oneshot::channel();
        self.steps.lock().push_back(Step::Held(receiver));

        sender
    }

    pub(crate) async fn started(&self) {
        self.started.notified().await;
    }

    pub(crate) fn calls(&self) -> Vec<MutationRequest> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl RemoteGateway for ScriptedGateway {
    async fn request(&self, request: &MutationRequest, _credential: &Credential) -> Outcome {
        self.calls.lock().push(*request);
        let step = self.steps.lock().pop_front();
        self.started.notify_one();

        match step {
            None => success(),
            Some(Step::Now(outcome)) => outcome,
            Some(Step::After(delay, outcome)) => {
                tokio::time::sleep(delay).await;
                outcome
            }
            Some(Step::Held(receiver)) => receiver
                .await
                .unwrap_or_else(|_| Outcome::Unreachable("held call abandoned".to_string())),
        }
    }
}

pub(crate) fn success() -> Outcome {
    Outcome::Success(Value::Null)
}

pub(crate) fn rejected(reason: RejectReason) -> Outcome {
    Outcome::Rejected(Rejection {
        reason,
        message: "refused by test".to_string(),
    })
}

pub(crate) fn unreachable() -> Outcome {
    Outcome::Unreachable("connection refused".to_string())
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub(crate) fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.seen.lock())
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.seen.lock().push(notification);
    }
}

pub(crate) struct FailingStore;

#[async_trait]
impl DurableStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("disk on fire".to_string()))
    }

    async fn set(&self, _key: &str, _value: String) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("disk on fire".to_string()))
    }
}

/// Writes never finish.
pub(crate) struct StalledStore;

#[async_trait]
impl DurableStore for StalledStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: String) -> Result<(), StorageError> {
        std::future::pending().await
    }
}

pub(crate) struct Harness {
    pub(crate) mutator: OptimisticMutator,
    pub(crate) gateway: Arc<ScriptedGateway>,
    pub(crate) session: Arc<SharedSession>,
    pub(crate) sink: Arc<RecordingSink>,
    pub(crate) durable: Arc<MemoryStore>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_session(SharedSession::signed_in(Credential::new("test-token")))
    }

    pub(crate) fn with_session(session: SharedSession) -> Self {
        let durable = Arc::new(MemoryStore::new());

        Self::build(session, durable.clone(), durable)
    }

    /// Persists into `backend`; `durable` stays empty.
    pub(crate) fn with_backend(backend: Arc<dyn DurableStore>) -> Self {
        let session = SharedSession::signed_in(Credential::new("test-token"));

        Self::build(session, backend, Arc::new(MemoryStore::new()))
    }

    fn build(
        session: SharedSession,
        backend: Arc<dyn DurableStore>,
        durable: Arc<MemoryStore>,
    ) -> Self {
        let gateway = ScriptedGateway::new();
        let session = Arc::new(session);
        let sink = Arc::new(RecordingSink::default());

        let store = Arc::new(CollectionStore::new());
        let persistence = Arc::new(PersistenceBridge::new(backend, store.clone()));

        let mutator = OptimisticMutator::new(
            store,
            gateway.clone(),
            session.clone(),
            persistence,
            sink.clone(),
            Arc::new(Titles::new()),
        );

        Self {
            mutator,
            gateway,
            session,
            sink,
            durable,
        }
    }

    pub(crate) fn store(&self) -> &CollectionStore {
        self.mutator.store()
    }
}
