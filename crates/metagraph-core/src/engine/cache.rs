//! Computed-value cache and invalidation.

use super::config::InvalidationPolicy;
use super::{Engine, InstanceRef};
use crate::error::{Error, Result};
use crate::storage::ObjectId;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use tracing::trace;

thread_local! {
    /// Derivations currently running on this thread, keyed by
    /// (engine address, object, cache key).
    static IN_FLIGHT: RefCell<HashSet<(usize, ObjectId, String)>> = RefCell::new(HashSet::new());
}

/// Removes its key from [`IN_FLIGHT`] when dropped.
struct InFlight {
    key: (usize, ObjectId, String),
}

impl InFlight {
    fn enter(engine: &Engine, id: ObjectId, key: &str) -> Option<Self> {
        let key = (engine as *const Engine as usize, id, key.to_string());
        let fresh = IN_FLIGHT.with(|set| set.borrow_mut().insert(key.clone()));
        fresh.then_some(Self { key })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        IN_FLIGHT.with(|set| {
            set.borrow_mut().remove(&self.key);
        });
    }
}

impl Engine {
    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub(crate) fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Serve `key` from the object's cache, or compute and store it.
    ///
    /// A derivation that re-enters itself on the same object fails instead
    /// of recursing forever.
    pub(crate) fn cached_or_compute(
        &self,
        handle: &InstanceRef,
        key: &str,
        compute: impl FnOnce() -> Result<Value>,
    ) -> Result<Value> {
        self.compute_value(handle, key, self.config.cache_derived_values, compute)
    }

    /// Like [`cached_or_compute`](Self::cached_or_compute), for derivations
    /// that read objects outside the neighbourhood of `handle`.
    ///
    /// Neighbourhood invalidation cannot reach those, so the value is only
    /// cached under the global policy.
    pub(crate) fn cached_if_global(
        &self,
        handle: &InstanceRef,
        key: &str,
        compute: impl FnOnce() -> Result<Value>,
    ) -> Result<Value> {
        let use_cache = self.config.cache_derived_values
            && self.config.invalidation == InvalidationPolicy::Global;
        self.compute_value(handle, key, use_cache, compute)
    }

    fn compute_value(
        &self,
        handle: &InstanceRef,
        key: &str,
        use_cache: bool,
        compute: impl FnOnce() -> Result<Value>,
    ) -> Result<Value> {
        let generation = self.generation();
        let lookup = self.storage().with_node(handle.id, |n| {
            (n.epoch(), n.cached(key, generation).cloned())
        });
        let Some((epoch, cached)) = lookup else {
            return Err(Error::InstanceNotFound(handle.id));
        };

        if use_cache {
            if let Some(value) = cached {
                self.metrics.record_cache_hit();
                trace!(id = %handle.id, key, "computed value cache hit");
                return Ok(value);
            }
            self.metrics.record_cache_miss();
        }

        let Some(_guard) = InFlight::enter(self, handle.id, key) else {
            return Err(Error::Evaluation {
                name: key.to_string(),
                message: format!("cyclic derivation on {}", handle.id),
            });
        };

        self.metrics.record_derived_evaluation();
        let value = compute()?;

        if use_cache {
            // The object may have been deleted meanwhile; nothing to cache then.
            let _ = self.storage().update_node(handle.id, |n| {
                n.store_cached(key, epoch, generation, value.clone())
            });
        }
        Ok(value)
    }

    /// Invalidate cached values after a write to `id`.
    pub(crate) fn invalidate(&self, id: ObjectId) {
        match self.config.invalidation {
            InvalidationPolicy::Global => self.bump_generation(),
            InvalidationPolicy::Neighborhood => {
                for target in self.neighborhood(id) {
                    let _ = self.storage().update_node(target, |n| n.bump_epoch());
                }
            }
        }
    }

    /// Invalidate cached values after a link between `source` and `target`
    /// was created or removed.
    pub(crate) fn invalidate_link(&self, source: ObjectId, target: ObjectId) {
        match self.config.invalidation {
            InvalidationPolicy::Global => self.bump_generation(),
            InvalidationPolicy::Neighborhood => {
                let mut touched = self.neighborhood(source);
                for id in self.neighborhood(target) {
                    if !touched.contains(&id) {
                        touched.push(id);
                    }
                }
                for id in touched {
                    let _ = self.storage().update_node(id, |n| n.bump_epoch());
                }
            }
        }
    }

    /// `id` followed by every object linked to it.
    fn neighborhood(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut ids = vec![id];
        let storage = self.storage();
        let linked = storage
            .get_outgoing_edges(id, None)
            .into_iter()
            .map(|l| l.target)
            .chain(storage.get_incoming_edges(id, None).into_iter().map(|l| l.source));
        for other in linked {
            if !ids.contains(&other) {
                ids.push(other);
            }
        }
        ids
    }
}
