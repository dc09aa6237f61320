//! Service layer
//!
//! The consensus engine and the narration it broadcasts.

mod consensus;
mod narration;

pub use consensus::ConsensusService;
pub use narration::DeleteNarration;
