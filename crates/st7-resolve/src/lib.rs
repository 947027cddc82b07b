//! Specification resolver: turns equation sets, spec sets and level or
//! timing sets into concrete numbers.
//!
//! Resolution runs in two phases. A flat variable closure is built from the
//! specs and then the equations, in declaration order. Every pin setting,
//! period and edge is then evaluated against that closure.
//!
//! - [`Resolver::resolve_levels`]: supply and pin levels
//! - [`Resolver::resolve_timing_single_port`]: period and edges of one
//!   timing set
//! - [`Resolver::resolve_timing_multiport`]: one closure per port of a
//!   multi-port specification
//!
//! [`ResolutionCache`] memoizes single-port results per run.

pub mod cache;
mod closure;
pub mod error;
pub mod levels;
pub mod multiport;
pub mod timing;

use st7_expr::{Evaluate, Evaluator};
use st7_model::{Levels, Timing};

pub use cache::{CacheStats, ResolutionCache};
pub use error::{ResolveError, Result};
pub use levels::{LevelsResolution, PinSettings, SettingValue, SettingValues};
pub use multiport::{MultiportResolution, PortResolution};
pub use timing::{PinEdges, TimingResolution};

use crate::timing::PeriodGrammar;

/// Resolves setups of a parsed model.
///
/// Generic over the expression evaluator so callers can wrap the default
/// one.
#[derive(Debug, Clone)]
pub struct Resolver<E = Evaluator> {
    evaluator: E,
    periods: PeriodGrammar,
}

impl Resolver<Evaluator> {
    pub fn new() -> Result<Self> {
        Self::with_evaluator(Evaluator)
    }
}

impl<E: Evaluate> Resolver<E> {
    pub fn with_evaluator(evaluator: E) -> Result<Self> {
        Ok(Self {
            evaluator,
            periods: PeriodGrammar::new()?,
        })
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Resolve levels for `eqnset`, its spec set `specset` and its level set
    /// `levelset`.
    pub fn resolve_levels(
        &self,
        levels: &Levels,
        eqnset: u32,
        specset: u32,
        levelset: u32,
    ) -> Result<LevelsResolution> {
        levels::resolve(&self.evaluator, levels, eqnset, specset, levelset)
    }

    /// Resolve the period and edges of one timing set.
    pub fn resolve_timing_single_port(
        &self,
        timing: &Timing,
        eqnset: u32,
        specset: u32,
        timingset: u32,
    ) -> Result<TimingResolution> {
        timing::resolve(
            &self.evaluator,
            &self.periods,
            timing,
            eqnset,
            specset,
            timingset,
        )
    }

    /// Resolve every port of a multi-port specification.
    ///
    /// `timingsets` holds one timing set per port, in port declaration
    /// order; a single entry applies to every port.
    pub fn resolve_timing_multiport(
        &self,
        timing: &Timing,
        specification: &str,
        timingsets: &[u32],
    ) -> Result<MultiportResolution> {
        multiport::resolve(
            &self.evaluator,
            &self.periods,
            timing,
            specification,
            timingsets,
        )
    }
}
