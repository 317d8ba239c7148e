//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tenant_config::cache::{BroadcastAnnouncer, ChangeEvent, InMemoryBackingStore, VersionedProxyCache};
use tenant_config::processors::{IncludeProcessor, Processor, ProcessorChain, SubstitutionProcessor};
use tenant_config::{ConfigStore, Configuration, PathLayout};
use tokio::sync::broadcast;

pub const ALIAS_PATH: &str = "/config/tenants/tenant-aliases.yml";

/// Absolute path of a tenant document.
pub fn tenant_path(tenant: &str, suffix: &str) -> String {
    PathLayout::default().tenant_path(tenant, suffix)
}

pub fn doc(path: &str, content: &str) -> Configuration {
    Configuration::new(path, content)
}

pub fn tenant_doc(tenant: &str, suffix: &str, content: &str) -> Configuration {
    Configuration::new(tenant_path(tenant, suffix), content)
}

/// Alias document for `parent → children` pairs, listed root first.
pub fn alias_doc(yaml: &str) -> Configuration {
    Configuration::new(ALIAS_PATH, yaml)
}

/// The MAIN → SUBMAIN → LIFETENANT chain.
pub fn main_chain_aliases() -> Configuration {
    alias_doc(
        "tenantAliasTree:\n  MAIN:\n    - key: SUBMAIN\n      children:\n        - key: LIFETENANT\n",
    )
}

/// Include and substitution processors with a fixed environment.
pub fn default_processors(env: &[(&str, &str)]) -> Vec<Box<dyn Processor>> {
    let env = env
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    vec![
        Box::new(IncludeProcessor::new()),
        Box::new(SubstitutionProcessor::with_environment("tenant-profile.yml", env, 10)),
    ]
}

pub fn store_with(processors: Vec<Box<dyn Processor>>, lock_timeout: Duration) -> Arc<ConfigStore> {
    Arc::new(ConfigStore::new(
        PathLayout::default(),
        ProcessorChain::new(processors),
        lock_timeout,
    ))
}

pub fn default_store() -> Arc<ConfigStore> {
    store_with(default_processors(&[]), Duration::from_secs(5))
}

/// Visible content at `path`, if any.
pub fn content(store: &ConfigStore, path: &str) -> Option<String> {
    store.get(path).map(|d| d.content().to_string())
}

/// Parse a visible JSON document.
pub fn json(store: &ConfigStore, path: &str) -> serde_json::Value {
    let doc = store.get(path).unwrap_or_else(|| panic!("{path} not visible"));
    serde_json::from_str(doc.content()).unwrap_or_else(|e| panic!("{path} is not JSON: {e}"))
}

pub struct CacheFixture {
    pub backing: Arc<InMemoryBackingStore>,
    pub store: Arc<ConfigStore>,
    pub cache: VersionedProxyCache,
    pub events: broadcast::Receiver<ChangeEvent>,
}

pub fn cache_fixture(lock_timeout: Duration) -> CacheFixture {
    let backing = Arc::new(InMemoryBackingStore::new());
    let store = store_with(default_processors(&[]), lock_timeout);
    let announcer = Arc::new(BroadcastAnnouncer::new(64));
    let events = announcer.subscribe();
    let cache = VersionedProxyCache::new(backing.clone(), store.clone(), announcer);
    CacheFixture {
        backing,
        store,
        cache,
        events,
    }
}

/// Drain every pending change event.
pub fn drain(events: &mut broadcast::Receiver<ChangeEvent>) -> Vec<ChangeEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

pub fn view_contents(view: &BTreeMap<String, Configuration>) -> BTreeMap<String, String> {
    view.iter()
        .map(|(k, v)| (k.clone(), v.content().to_string()))
        .collect()
}
