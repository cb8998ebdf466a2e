use crate::{config::Config, repos::Repos, services::MarkerService, stores::Stores};

#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Database repositories.
    pub repos: Repos,
    /// Ephemeral stores (Redis).
    pub stores: Stores,
    /// Marker query engine, wired over the repos and stores.
    pub markers: MarkerService,
}

impl AppState {
    pub fn new(config: Config, repos: Repos, stores: Stores) -> Self {
        let markers = MarkerService::new(
            repos.markers.clone(),
            stores.marker_cache.clone(),
            config.nearby_cache_ttl_seconds,
            config.viewport_cache_ttl_seconds,
        );

        Self {
            config,
            repos,
            stores,
            markers,
        }
    }
}
