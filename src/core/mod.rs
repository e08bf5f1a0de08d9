mod classifier;
mod correlator;
mod engine;
mod instrumenter;
mod support;
mod tracker;
mod walker;

pub use classifier::{LineClassifier, LineDecision};
pub use correlator::{Correlator, CoverageDump, FileStats};
pub use instrumenter::{FileInstrumenter, InstrumentedFile};
pub use support::SupportEmitter;
pub use tracker::{BraceTracker, RegionKind};
pub use walker::{SourceWalker, WalkedFile};

// Export the main engine
pub use engine::Engine;
