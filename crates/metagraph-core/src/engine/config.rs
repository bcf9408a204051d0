//! Engine configuration.

/// Default limit on composite cascade depth.
pub const DEFAULT_MAX_CASCADE_DEPTH: usize = 100;

/// How cached derived values are invalidated on mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidationPolicy {
    /// A write invalidates the written object and every object linked to it.
    ///
    /// Exact for derivations that read only the object and its direct
    /// neighbours.
    #[default]
    Neighborhood,
    /// Any mutation invalidates every cached value.
    Global,
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cache derived property and end values.
    pub cache_derived_values: bool,

    /// Cache invalidation policy.
    pub invalidation: InvalidationPolicy,

    /// Maximum depth of a composite cascade delete.
    pub max_cascade_depth: usize,

    /// Report lower-bound multiplicity shortfalls from `validate_instance`.
    pub check_lower_bounds: bool,
}

impl EngineConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self {
            cache_derived_values: true,
            invalidation: InvalidationPolicy::default(),
            max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
            check_lower_bounds: false,
        }
    }

    /// Disable the computed-value cache.
    pub fn without_cache(mut self) -> Self {
        self.cache_derived_values = false;
        self
    }

    /// Set the invalidation policy.
    pub fn with_invalidation(mut self, policy: InvalidationPolicy) -> Self {
        self.invalidation = policy;
        self
    }

    /// Set the cascade depth limit.
    pub fn with_max_cascade_depth(mut self, depth: usize) -> Self {
        self.max_cascade_depth = depth;
        self
    }

    /// Enable built-in lower-bound checks during validation.
    pub fn with_lower_bound_checks(mut self) -> Self {
        self.check_lower_bounds = true;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.cache_derived_values);
        assert_eq!(config.invalidation, InvalidationPolicy::Neighborhood);
        assert_eq!(config.max_cascade_depth, DEFAULT_MAX_CASCADE_DEPTH);
        assert!(!config.check_lower_bounds);
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .without_cache()
            .with_invalidation(InvalidationPolicy::Global)
            .with_max_cascade_depth(3)
            .with_lower_bound_checks();
        assert!(!config.cache_derived_values);
        assert_eq!(config.invalidation, InvalidationPolicy::Global);
        assert_eq!(config.max_cascade_depth, 3);
        assert!(config.check_lower_bounds);
    }
}
