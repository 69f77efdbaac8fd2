//! The collection orchestrator.
//!
//! [`Collector`] drives every configured [`reachdb_core::PlatformSource`]
//! through one pass, persisting through a [`reachdb_core::MetricsStore`] and
//! recording one run per source. [`run_once`] and [`run_scheduled`] are the
//! two execution modes; [`StartupGate`] holds the first pass back until an
//! external credential exchange has finished.

mod collector;
mod gate;
mod runner;

#[cfg(test)]
mod fakes;

pub use collector::{Collector, PassSummary, SourceEntry, SourceReport};
pub use gate::{GateOpener, StartupGate};
pub use runner::{run_once, run_scheduled};
