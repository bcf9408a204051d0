//! Metrics collection for the engine.
//!
//! # Usage
//!
//! ```ignore
//! use metagraph_core::metrics::new_shared_metrics;
//!
//! let metrics = new_shared_metrics();
//! metrics.record_instance_created("Part");
//! metrics.record_cache_hit();
//!
//! let prometheus_text = metrics.to_prometheus();
//! ```

mod registry;

pub use registry::{new_shared_metrics, EngineMetrics, SharedEngineMetrics};
