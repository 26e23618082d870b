//! # Mutation Serializer
//!
//! At most one mutation in flight per (collection, movie).
//!
//! A second request for a busy key is queued, never dropped: dropping would silently lose a user toggle.
//! Queued requests are served in the order they were admitted, and the busy flag is handed straight from
//! the finishing [`Ticket`] to the next [`Waiter`], so nobody can slip in between.
//!
//! Releasing is dropping the ticket.
use std::{
    collections::{HashMap, VecDeque, hash_map::Entry},
    sync::Arc,
};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use crate::model::{CollectionKind, MovieId};

pub type MutationKey = (CollectionKind, MovieId);

type Queues = HashMap<MutationKey, VecDeque<oneshot::Sender<()>>>;

#[derive(Debug, Clone, Default)]
pub struct MutationSerializer {
    queues: Arc<Mutex<Queues>>,
}

pub enum Admission {
    Ticket(Ticket),
    Wait(Waiter),
}

impl Admission {
    pub async fn ready(self) -> Ticket {
        match self {
            Admission::Ticket(ticket) => ticket,
            Admission::Wait(waiter) => waiter.ready().await,
        }
    }
}

impl MutationSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&self, kind: CollectionKind, movie_id: MovieId) -> Admission {
        let key = (kind, movie_id);
        let mut queues = self.queues.lock();

        match queues.entry(key) {
            Entry::Vacant(entry) => {
                entry.insert(VecDeque::new());

                Admission::Ticket(Ticket {
                    key,
                    queues: self.queues.clone(),
                })
            }
            Entry::Occupied(mut entry) => {
                let (sender, receiver) = oneshot::channel();
                entry.get_mut().push_back(sender);

                debug!(%kind, movie_id, queued = entry.get().len(), "Mutation queued");

                Admission::Wait(Waiter {
                    key,
                    receiver: Some(receiver),
                    queues: self.queues.clone(),
                })
            }
        }
    }

    pub fn is_busy(&self, kind: CollectionKind, movie_id: MovieId) -> bool {
        self.queues.lock().contains_key(&(kind, movie_id))
    }

    /// Number of keys with a mutation in flight.
    pub fn in_flight(&self) -> usize {
        self.queues.lock().len()
    }
}

fn hand_off(queues: &mut Queues, key: MutationKey) {
    let Some(waiting) = queues.get_mut(&key) else {
        return;
    };

    // a failed send means that waiter gave up, try the next one
    while let Some(next) = waiting.pop_front() {
        if next.send(()).is_ok() {
            return;
        }
    }

    queues.remove(&key);
}

/// Exclusive right to mutate one key.
#[must_use = "dropping a ticket releases the key"]
pub struct Ticket {
    key: MutationKey,
    queues: Arc<Mutex<Queues>>,
}

impl Ticket {
    pub fn key(&self) -> MutationKey {
        self.key
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        hand_off(&mut self.queues.lock(), self.key);
    }
}

pub struct Waiter {
    key: MutationKey,
    receiver: Option<oneshot::Receiver<()>>,
    queues: Arc<Mutex<Queues>>,
}

impl Waiter {
    pub async fn ready(mut self) -> Ticket {
        if let Some(receiver) = self.receiver.as_mut() {
            // senders are only dropped after a failed send, which needs this receiver gone
            let _ = receiver.await;
        }
        self.receiver = None;

        Ticket {
            key: self.key,
            queues: self.queues.clone(),
        }
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        let Some(mut receiver) = self.receiver.take() else {
            return;
        };

        // sends happen under this lock, so closing here cannot race a hand off
        let mut queues = self.queues.lock();
        receiver.close();

        if receiver.try_recv().is_ok() {
            hand_off(&mut queues, self.key);
        }
    }
}
