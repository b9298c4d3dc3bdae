//! Built-in job handlers.

pub mod analysis;
pub mod generation;

pub use analysis::AnalysisHandler;
pub use generation::GenerationHandler;
