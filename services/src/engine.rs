use crate::client::SimilarityClient;
use crate::notifier::Notifier;
use crate::storage::ContentStore;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use util::config::PluginConfig;

/// Everything the entry points share. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    pub db: DatabaseConnection,
    pub client: Arc<dyn SimilarityClient>,
    pub notifier: Arc<dyn Notifier>,
    pub store: ContentStore,
    pub config: Arc<PluginConfig>,
}

impl Engine {
    pub fn new(
        db: DatabaseConnection,
        client: Arc<dyn SimilarityClient>,
        notifier: Arc<dyn Notifier>,
        store: ContentStore,
        config: PluginConfig,
    ) -> Self {
        Self {
            db,
            client,
            notifier,
            store,
            config: Arc::new(config),
        }
    }
}
