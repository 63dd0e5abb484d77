//! Activity journal: the sink every component reports what it did to.
//!
//! The sink is handed to each component explicitly instead of being reached
//! through global state. [`TracingSink`] forwards everything to `tracing`;
//! tests use a recording sink to assert on order and content.

mod record;
#[cfg(test)]
mod recording;
mod sink;

pub use record::{ActionKind, ActionRecord};
#[cfg(test)]
pub use recording::RecordingSink;
pub use sink::{ActivitySink, TracingSink};
