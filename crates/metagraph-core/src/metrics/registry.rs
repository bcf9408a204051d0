//! Engine metrics registry.
//!
//! Counters for instance and link churn, derived-value evaluation, cache
//! behaviour and validation, exportable in Prometheus text format.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Counters collected by an [`Engine`](crate::engine::Engine).
pub struct EngineMetrics {
    started_at: Instant,

    // Instance metrics
    instances_created: AtomicU64,
    instances_deleted: AtomicU64,
    cascade_deletes: AtomicU64,
    created_by_class: RwLock<HashMap<String, u64>>,

    // Link metrics
    links_created: AtomicU64,
    links_removed: AtomicU64,

    // Evaluation metrics
    derived_evaluations: AtomicU64,
    operations_invoked: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,

    // Validation metrics
    validations_run: AtomicU64,
    violations_found: AtomicU64,
}

impl EngineMetrics {
    /// Create a registry with every counter at zero.
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            instances_created: AtomicU64::new(0),
            instances_deleted: AtomicU64::new(0),
            cascade_deletes: AtomicU64::new(0),
            created_by_class: RwLock::new(HashMap::new()),
            links_created: AtomicU64::new(0),
            links_removed: AtomicU64::new(0),
            derived_evaluations: AtomicU64::new(0),
            operations_invoked: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            validations_run: AtomicU64::new(0),
            violations_found: AtomicU64::new(0),
        }
    }

    /// Record an instance creation.
    pub fn record_instance_created(&self, class: &str) {
        self.instances_created.fetch_add(1, Ordering::Relaxed);
        *self
            .created_by_class
            .write()
            .entry(class.to_string())
            .or_insert(0) += 1;
    }

    /// Record an instance deletion; `cascaded` when removed as a composite part.
    pub fn record_instance_deleted(&self, cascaded: bool) {
        self.instances_deleted.fetch_add(1, Ordering::Relaxed);
        if cascaded {
            self.cascade_deletes.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a link creation.
    pub fn record_link_created(&self) {
        self.links_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record link removals.
    pub fn record_links_removed(&self, count: u64) {
        self.links_removed.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a derived-value evaluation.
    pub fn record_derived_evaluation(&self) {
        self.derived_evaluations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an operation invocation.
    pub fn record_operation(&self) {
        self.operations_invoked.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a computed-value cache hit.
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a computed-value cache miss.
    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a validation pass and the violations it produced.
    pub fn record_validation(&self, violations: u64) {
        self.validations_run.fetch_add(1, Ordering::Relaxed);
        self.violations_found.fetch_add(violations, Ordering::Relaxed);
    }

    // Getters

    /// Uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Instances created.
    pub fn instances_created(&self) -> u64 {
        self.instances_created.load(Ordering::Relaxed)
    }

    /// Instances deleted, cascades included.
    pub fn instances_deleted(&self) -> u64 {
        self.instances_deleted.load(Ordering::Relaxed)
    }

    /// Instances deleted as composite parts.
    pub fn cascade_deletes(&self) -> u64 {
        self.cascade_deletes.load(Ordering::Relaxed)
    }

    /// Creations per class.
    pub fn created_by_class(&self) -> HashMap<String, u64> {
        self.created_by_class.read().clone()
    }

    /// Links created.
    pub fn links_created(&self) -> u64 {
        self.links_created.load(Ordering::Relaxed)
    }

    /// Links removed.
    pub fn links_removed(&self) -> u64 {
        self.links_removed.load(Ordering::Relaxed)
    }

    /// Derived evaluations performed.
    pub fn derived_evaluations(&self) -> u64 {
        self.derived_evaluations.load(Ordering::Relaxed)
    }

    /// Operations invoked.
    pub fn operations_invoked(&self) -> u64 {
        self.operations_invoked.load(Ordering::Relaxed)
    }

    /// Cache hits.
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Cache misses.
    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    /// Cache hit rate (0.0 - 1.0).
    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.cache_hits() as f64;
        let total = hits + self.cache_misses() as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }

    /// Validation passes run.
    pub fn validations_run(&self) -> u64 {
        self.validations_run.load(Ordering::Relaxed)
    }

    /// Violations reported.
    pub fn violations_found(&self) -> u64 {
        self.violations_found.load(Ordering::Relaxed)
    }

    /// Export to Prometheus text format.
    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();

        let mut metric = |name: &str, kind: &str, help: &str, value: String| {
            out.push_str(&format!("# HELP metagraph_{name} {help}\n"));
            out.push_str(&format!("# TYPE metagraph_{name} {kind}\n"));
            out.push_str(&format!("metagraph_{name} {value}\n\n"));
        };

        metric("uptime_seconds", "gauge", "Engine uptime in seconds", self.uptime_secs().to_string());
        metric(
            "instances_created_total",
            "counter",
            "Instances created",
            self.instances_created().to_string(),
        );
        metric(
            "instances_deleted_total",
            "counter",
            "Instances deleted, cascades included",
            self.instances_deleted().to_string(),
        );
        metric(
            "cascade_deletes_total",
            "counter",
            "Instances deleted as composite parts",
            self.cascade_deletes().to_string(),
        );
        metric("links_created_total", "counter", "Links created", self.links_created().to_string());
        metric("links_removed_total", "counter", "Links removed", self.links_removed().to_string());
        metric(
            "derived_evaluations_total",
            "counter",
            "Derived value evaluations",
            self.derived_evaluations().to_string(),
        );
        metric(
            "operations_invoked_total",
            "counter",
            "Operations invoked",
            self.operations_invoked().to_string(),
        );
        metric("cache_hits_total", "counter", "Computed-value cache hits", self.cache_hits().to_string());
        metric(
            "cache_misses_total",
            "counter",
            "Computed-value cache misses",
            self.cache_misses().to_string(),
        );
        metric(
            "cache_hit_rate",
            "gauge",
            "Computed-value cache hit rate",
            format!("{:.4}", self.cache_hit_rate()),
        );
        metric("validations_total", "counter", "Validation passes", self.validations_run().to_string());
        metric(
            "violations_total",
            "counter",
            "Validation violations reported",
            self.violations_found().to_string(),
        );

        let by_class = self.created_by_class();
        if !by_class.is_empty() {
            let mut classes: Vec<_> = by_class.into_iter().collect();
            classes.sort();
            out.push_str("# HELP metagraph_instances_created_by_class Instances created per class\n");
            out.push_str("# TYPE metagraph_instances_created_by_class counter\n");
            for (class, count) in classes {
                out.push_str(&format!(
                    "metagraph_instances_created_by_class{{class=\"{class}\"}} {count}\n"
                ));
            }
        }

        out
    }

    /// Reset all metrics (for testing).
    pub fn reset(&self) {
        self.instances_created.store(0, Ordering::Relaxed);
        self.instances_deleted.store(0, Ordering::Relaxed);
        self.cascade_deletes.store(0, Ordering::Relaxed);
        self.created_by_class.write().clear();
        self.links_created.store(0, Ordering::Relaxed);
        self.links_removed.store(0, Ordering::Relaxed);
        self.derived_evaluations.store(0, Ordering::Relaxed);
        self.operations_invoked.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.validations_run.store(0, Ordering::Relaxed);
        self.violations_found.store(0, Ordering::Relaxed);
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics handle.
pub type SharedEngineMetrics = Arc<EngineMetrics>;

/// Create a new shared metrics registry.
pub fn new_shared_metrics() -> SharedEngineMetrics {
    Arc::new(EngineMetrics::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_metrics() {
        let metrics = EngineMetrics::new();
        metrics.record_instance_created("Part");
        metrics.record_instance_created("Part");
        metrics.record_instance_created("Port");
        metrics.record_instance_deleted(false);
        metrics.record_instance_deleted(true);

        assert_eq!(metrics.instances_created(), 3);
        assert_eq!(metrics.instances_deleted(), 2);
        assert_eq!(metrics.cascade_deletes(), 1);
        assert_eq!(metrics.created_by_class().get("Part"), Some(&2));
    }

    #[test]
    fn test_cache_hit_rate() {
        let metrics = EngineMetrics::new();
        assert_eq!(metrics.cache_hit_rate(), 0.0);
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_miss();
        assert!((metrics.cache_hit_rate() - 0.75).abs() < 0.001);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = EngineMetrics::new();
        metrics.record_instance_created("Part");
        metrics.record_link_created();
        metrics.record_validation(2);

        let text = metrics.to_prometheus();
        assert!(text.contains("metagraph_instances_created_total 1"));
        assert!(text.contains("metagraph_links_created_total 1"));
        assert!(text.contains("metagraph_violations_total 2"));
        assert!(text.contains("metagraph_instances_created_by_class{class=\"Part\"} 1"));
        assert!(text.contains("# TYPE metagraph_cache_hit_rate gauge"));
    }

    #[test]
    fn test_reset() {
        let metrics = EngineMetrics::new();
        metrics.record_instance_created("Part");
        metrics.record_links_removed(4);
        metrics.record_derived_evaluation();
        metrics.reset();

        assert_eq!(metrics.instances_created(), 0);
        assert_eq!(metrics.links_removed(), 0);
        assert_eq!(metrics.derived_evaluations(), 0);
        assert!(metrics.created_by_class().is_empty());
    }
}
