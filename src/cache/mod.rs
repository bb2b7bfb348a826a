//! Cache of compiled reasoners, keyed by rule source
//!
//! Built on a single `moka::sync::Cache`. Loading goes through
//! `try_get_with`, so for any key at most one thread reads and parses the
//! rule text while concurrent callers for that key wait and share its
//! result. Different keys load in parallel. A failed load is never stored.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::CacheConfig;
use crate::error::{ReasonError, ReasonResult};
use crate::parser::{PrefixBinding, PrefixTable};
use crate::reasoner::{EngineConfig, ForwardEngine, RuleSet};
use crate::source::{load_rule_set, RuleSource};

/// Identity of a compiled reasoner: the rule location and the prefix
/// bindings it was parsed under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EngineKey {
    pub location: String,
    pub prefixes: Vec<PrefixBinding>,
}

impl EngineKey {
    pub fn new(location: impl Into<String>, prefixes: &PrefixTable) -> Self {
        EngineKey { location: location.into(), prefixes: prefixes.to_bindings() }
    }
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
    pub constructions: u64,
    pub failures: u64,
    pub hit_rate: f64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    constructions: AtomicU64,
    failures: AtomicU64,
}

/// Shared, thread-safe reasoner cache
#[derive(Clone)]
pub struct ReasonerCache {
    /// `None` when caching is disabled
    inner: Option<Cache<EngineKey, Arc<ForwardEngine>>>,
    engine_config: EngineConfig,
    counters: Arc<Counters>,
}

impl ReasonerCache {
    pub fn new(config: &CacheConfig, engine_config: EngineConfig) -> Self {
        let inner = config.enabled.then(|| {
            let mut builder = Cache::builder();
            if let Some(max) = config.max_entries {
                builder = builder.max_capacity(max);
            }
            if let Some(ttl) = config.ttl_secs {
                builder = builder.time_to_live(Duration::from_secs(ttl));
            }
            builder.build()
        });
        ReasonerCache { inner, engine_config, counters: Arc::new(Counters::default()) }
    }

    /// Unbounded cache with default engine settings
    pub fn unbounded() -> Self {
        Self::new(&CacheConfig::default(), EngineConfig::default())
    }

    /// The engine for `source` parsed under `prefixes`, loading it on a miss
    pub fn get_or_create(&self, source: &RuleSource, prefixes: &PrefixTable) -> ReasonResult<Arc<ForwardEngine>> {
        let key = EngineKey::new(source.location.clone(), prefixes);
        self.get_or_create_with(key, || load_rule_set(source, prefixes))
    }

    /// As [`get_or_create`](Self::get_or_create), with a caller-supplied loader
    pub fn get_or_create_with<F>(&self, key: EngineKey, load: F) -> ReasonResult<Arc<ForwardEngine>>
    where
        F: FnOnce() -> ReasonResult<RuleSet>,
    {
        let Some(cache) = &self.inner else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return self.construct(&key, load);
        };

        let mut constructed = false;
        let result = cache.try_get_with(key.clone(), || {
            constructed = true;
            self.construct(&key, load)
        });

        match result {
            Ok(engine) => {
                if constructed {
                    self.counters.misses.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(source = %key.location, "Reasoner cache hit");
                }
                Ok(engine)
            }
            Err(err) => Err(ReasonError::clone(&err)),
        }
    }

    fn construct<F>(&self, key: &EngineKey, load: F) -> ReasonResult<Arc<ForwardEngine>>
    where
        F: FnOnce() -> ReasonResult<RuleSet>,
    {
        let built = load().and_then(|rules| ForwardEngine::new(rules, self.engine_config.clone()));
        match built {
            Ok(engine) => {
                self.counters.constructions.fetch_add(1, Ordering::Relaxed);
                info!(source = %key.location, rules = engine.rules().len(), "Reasoner constructed");
                Ok(Arc::new(engine))
            }
            Err(err) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                Err(err)
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Number of cached reasoners
    pub fn len(&self) -> u64 {
        self.inner.as_ref().map_or(0, |cache| {
            cache.run_pending_tasks();
            cache.entry_count()
        })
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Some(cache) = &self.inner {
            cache.invalidate_all();
            cache.run_pending_tasks();
        }
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            entries: self.len(),
            hits,
            misses,
            constructions: self.counters.constructions.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            hit_rate: if lookups == 0 { 0.0 } else { hits as f64 / lookups as f64 },
        }
    }
}
