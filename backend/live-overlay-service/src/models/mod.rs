pub mod display;
pub mod envelope;

pub use display::DisplayEvent;
pub use envelope::{Envelope, EnvelopeError, EventCategory, GiftDescriptor, LiveEvent};
