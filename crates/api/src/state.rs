use std::sync::Arc;

use assetlink_core::association::service::AssociationService;
use assetlink_db::store::PgResourceStore;
use assetlink_db::transition::TransitionStrategy;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is an `Arc` or a pool handle.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: assetlink_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// The only entry point for opening or closing associations.
    pub associations: AssociationService,
    /// Name of the transition strategy picked at startup.
    pub transition_strategy: &'static str,
}

impl AppState {
    pub fn new(
        pool: assetlink_db::DbPool,
        config: ServerConfig,
        strategy: Arc<dyn TransitionStrategy>,
    ) -> Self {
        let transition_strategy = strategy.name();
        let store = Arc::new(PgResourceStore::new(pool.clone(), strategy));
        let associations = AssociationService::new(store).with_lock_ttl(config.lock_ttl_mins);
        Self {
            pool,
            config: Arc::new(config),
            associations,
            transition_strategy,
        }
    }
}
