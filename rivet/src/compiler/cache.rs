//! Per-key memoization of compiled factories

use super::CompiledFactory;
use crate::{error::Error, target::ServiceKey};
use dashmap::{DashMap, DashSet};
use std::sync::{Arc, OnceLock};

type CompileSlot = Arc<OnceLock<Result<Arc<CompiledFactory>, Error>>>;

/// Compiled factories keyed by request.
///
/// Each key has a one-time slot stamped with the registry generation it was created
/// for; the map shard is locked only to fetch the slot, never while compiling, so
/// concurrent first requests for one key compile once and requests for other keys
/// never wait on it. A slot from an older generation is replaced on its next request;
/// generations only grow, so a late request never evicts a newer slot.
#[derive(Default)]
pub(crate) struct FactoryCache {
    entries: DashMap<ServiceKey, (u64, CompileSlot)>,
    missing: DashSet<ServiceKey>,
}

impl FactoryCache {
    /// Returns the memoized result for `key` at `generation`, compiling it on first use
    pub(crate) fn get_or_compile<F>(&self, key: &ServiceKey, generation: u64, compile: F) -> Result<Arc<CompiledFactory>, Error>
    where
        F: FnOnce() -> Result<CompiledFactory, Error>
    {
        let slot = {
            let mut entry = self.entries
                .entry(key.clone())
                .or_insert_with(|| (generation, CompileSlot::default()));
            if entry.0 < generation {
                *entry = (generation, CompileSlot::default());
            }
            entry.1.clone()
        };

        let result = slot
            .get_or_init(|| compile().map(Arc::new))
            .clone();

        match &result {
            Ok(factory) if factory.is_missing() => {
                self.missing.insert(key.clone());
            }
            Ok(_) => {
                self.missing.remove(key);
            }
            Err(_) => {}
        }
        result
    }

    /// Forgets missing keys that `resolvable` now reports as served
    pub(crate) fn prune_missing(&self, resolvable: impl Fn(&ServiceKey) -> bool) {
        self.missing.retain(|key| !resolvable(key));
    }

    /// Keys requested without a producer
    pub(crate) fn missing_keys(&self) -> Vec<ServiceKey> {
        self.missing
            .iter()
            .map(|key| key.clone())
            .collect()
    }
}
