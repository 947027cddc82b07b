//! Memoization of resolved setups for the lifetime of a run.
//!
//! The model does not change once parsed, so an entry never goes stale.
//! Failed resolutions are not stored.

use std::collections::HashMap;
use std::sync::Arc;

use st7_expr::Evaluate;
use st7_model::{Levels, Timing};
use tracing::debug;

use crate::error::Result;
use crate::levels::LevelsResolution;
use crate::timing::TimingResolution;
use crate::Resolver;

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

/// Resolved levels and timing setups keyed by their set numbers.
#[derive(Debug, Clone)]
pub struct ResolutionCache {
    levels: HashMap<String, Arc<LevelsResolution>>,
    timing: HashMap<String, Arc<TimingResolution>>,
    hits: usize,
    misses: usize,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self {
            levels: HashMap::new(),
            timing: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Resolve a levels setup, or return the earlier result for the same key.
    pub fn levels<E: Evaluate>(
        &mut self,
        resolver: &Resolver<E>,
        levels: &Levels,
        eqnset: u32,
        specset: u32,
        levelset: u32,
    ) -> Result<Arc<LevelsResolution>> {
        let key = format!("{eqnset}__{levelset}__{specset}");
        if let Some(hit) = self.levels.get(&key) {
            self.hits += 1;
            debug!(key = %key, "levels cache hit");
            return Ok(Arc::clone(hit));
        }
        self.misses += 1;
        let resolved = Arc::new(resolver.resolve_levels(levels, eqnset, specset, levelset)?);
        self.levels.insert(key, Arc::clone(&resolved));
        Ok(resolved)
    }

    /// Resolve a single-port timing setup, or return the earlier result for
    /// the same key.
    pub fn timing<E: Evaluate>(
        &mut self,
        resolver: &Resolver<E>,
        timing: &Timing,
        eqnset: u32,
        specset: u32,
        timingset: u32,
    ) -> Result<Arc<TimingResolution>> {
        let key = format!("{eqnset}__{timingset}__{specset}");
        if let Some(hit) = self.timing.get(&key) {
            self.hits += 1;
            debug!(key = %key, "timing cache hit");
            return Ok(Arc::clone(hit));
        }
        self.misses += 1;
        let resolved = Arc::new(resolver.resolve_timing_single_port(
            timing, eqnset, specset, timingset,
        )?);
        self.timing.insert(key, Arc::clone(&resolved));
        Ok(resolved)
    }

    /// Return cache usage statistics.
    pub fn statistics(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.levels.len() + self.timing.len(),
        }
    }
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new()
    }
}
