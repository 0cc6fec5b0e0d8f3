//! Core types shared by the disk-controller crates.
//!
//! Everything is timed in master clock ticks. A controller is told the
//! current real time by its host; it never reads a global clock.

mod clock;
mod observable;
mod ticks;

pub use clock::MasterClock;
pub use observable::{Observable, Value};
pub use ticks::Ticks;
