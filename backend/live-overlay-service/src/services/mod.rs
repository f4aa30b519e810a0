pub mod classifier;
pub mod dispatcher;
pub mod processor;
pub mod supervisor;

pub use classifier::{DropReason, EventClassifier};
pub use dispatcher::{connect_channel, LiveOverlayService, SessionEnd};
pub use processor::{DisplayProcessor, DisplayTimings, ProcessorPhase};
pub use supervisor::supervise;
