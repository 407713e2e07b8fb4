//! Progression-gated chat visibility.
//!
//! Decides, per viewer request, which lesson chat messages the viewer may see.
//! Peer messages are gated on relative course progress; system, own, addressed,
//! reply and staff messages always pass. The engine only reads: progress and
//! cohort data come in through [`ProgressStore`] and [`CohortStore`].

pub mod config;
pub mod error;
pub mod filter;
pub mod progress;
pub mod provenance;
pub mod store;

#[cfg(test)]
mod test_utils;

pub use config::{EngineConfig, SenderLookupFailure};
pub use error::VisibilityError;
pub use filter::{Decision, Viewer, VisibilityEngine, is_visible};
pub use provenance::{CandidateIndex, Provenance, classify};
pub use store::{CohortStore, ProgressStore};
