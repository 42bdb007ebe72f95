//! Museum clients keyed by tag.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use super::{AicClient, CmaClient, MetClient, MuseumClient, MuseumError};
use crate::artwork::MuseumTag;
use crate::config::MuseumsConfig;
use crate::rate_limiter::{MuseumRateLimit, RateLimiterPool};

/// Registry of museum clients, one per tag.
#[derive(Default, Clone)]
pub struct MuseumRegistry {
    clients: HashMap<MuseumTag, Arc<dyn MuseumClient>>,
}

impl MuseumRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build clients for every enabled museum, sharing one rate limiter pool.
    pub fn from_config(config: &MuseumsConfig) -> Result<Self, MuseumError> {
        let enabled = config.enabled();
        let limits: Vec<MuseumRateLimit> = enabled
            .iter()
            .map(|tag| MuseumRateLimit {
                museum: *tag,
                interval: config.get(*tag).request_interval(),
            })
            .collect();
        let limiter = Arc::new(RateLimiterPool::new(&limits));

        let mut registry = Self::new();
        for tag in enabled {
            let museum = config.get(tag);
            let client: Arc<dyn MuseumClient> = match tag {
                MuseumTag::Aic => Arc::new(AicClient::new(museum, Arc::clone(&limiter))?),
                MuseumTag::Met => Arc::new(MetClient::new(museum, Arc::clone(&limiter))?),
                MuseumTag::Cma => Arc::new(CmaClient::new(museum, Arc::clone(&limiter))?),
            };
            info!(
                museum = %tag,
                base_url = %museum.base_url(tag),
                interval_ms = museum.request_interval().as_millis() as u64,
                "registered museum client"
            );
            registry.register(client);
        }
        Ok(registry)
    }

    /// Add or replace the client for its tag.
    pub fn register(&mut self, client: Arc<dyn MuseumClient>) {
        self.clients.insert(client.tag(), client);
    }

    pub fn get(&self, tag: MuseumTag) -> Option<Arc<dyn MuseumClient>> {
        self.clients.get(&tag).cloned()
    }

    pub fn contains(&self, tag: MuseumTag) -> bool {
        self.clients.contains_key(&tag)
    }

    /// Registered tags in processing order.
    pub fn tags(&self) -> Vec<MuseumTag> {
        let mut tags: Vec<MuseumTag> = self.clients.keys().copied().collect();
        tags.sort();
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_skips_disabled_museums() {
        let mut config = MuseumsConfig::default();
        config.met.enabled = false;

        let registry = MuseumRegistry::from_config(&config).unwrap();
        assert_eq!(registry.tags(), vec![MuseumTag::Aic, MuseumTag::Cma]);
        assert!(!registry.contains(MuseumTag::Met));
        assert_eq!(registry.get(MuseumTag::Cma).unwrap().tag(), MuseumTag::Cma);
    }

    #[test]
    fn test_empty_registry() {
        let registry = MuseumRegistry::new();
        assert!(registry.tags().is_empty());
        assert!(registry.get(MuseumTag::Aic).is_none());
    }
}
