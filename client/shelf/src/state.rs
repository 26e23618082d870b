use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    config::Config,
    error::ShelfError,
    gateway::{HttpGateway, RemoteGateway},
    mutator::OptimisticMutator,
    notify::{NotificationSink, Titles},
    persistence::{DurableStore, MemoryStore, PersistenceBridge, RedisStore},
    session::SharedSession,
    store::CollectionStore,
};

/// Everything one signed-in client needs, wired once at start-up.
pub struct Shelf {
    pub session: Arc<SharedSession>,
    mutator: OptimisticMutator,
}

impl Shelf {
    pub async fn new(config: &Config, sink: Arc<dyn NotificationSink>) -> Result<Self, ShelfError> {
        let gateway = Arc::new(HttpGateway::new(&config.api_url, config.request_timeout)?);

        let durable: Arc<dyn DurableStore> = match RedisStore::connect(&config.redis_url).await {
            Ok(redis) => {
                info!(url = %config.redis_url, "Connected to Redis");
                Arc::new(redis)
            }
            Err(e) => {
                warn!("Redis unavailable, collections will not outlive this run: {e}");
                Arc::new(MemoryStore::new())
            }
        };

        let session = Arc::new(match &config.token {
            Some(token) => SharedSession::signed_in(token.clone()),
            None => SharedSession::signed_out(),
        });

        Ok(Self::assemble(gateway, durable, session, sink).await)
    }

    pub async fn assemble(
        gateway: Arc<dyn RemoteGateway>,
        durable: Arc<dyn DurableStore>,
        session: Arc<SharedSession>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let store = Arc::new(CollectionStore::new());
        let persistence = Arc::new(PersistenceBridge::new(durable, store.clone()));

        store.hydrate(persistence.hydrate().await);

        let mutator = OptimisticMutator::new(
            store,
            gateway,
            session.clone(),
            persistence,
            sink,
            Arc::new(Titles::new()),
        );

        Self { session, mutator }
    }

    pub fn mutator(&self) -> &OptimisticMutator {
        &self.mutator
    }
}
