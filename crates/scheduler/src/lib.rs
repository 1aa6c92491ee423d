//! PDF Annotator Scheduler Library
//!
//! Timing primitives for the single-threaded editing core: debounce sites that
//! hold one pending operation each, the clocks that drive them, and
//! cancellation tokens for work finished by outside collaborators.
//!
//! # Example
//!
//! ```
//! use pdf_annotator_scheduler::{Clock, Debounce, ManualClock};
//! use std::time::Duration;
//!
//! let clock = ManualClock::new();
//! let mut redraw = Debounce::new(Duration::from_millis(200));
//!
//! redraw.schedule(clock.now(), "page 3");
//! clock.advance(Duration::from_millis(200));
//!
//! assert_eq!(redraw.poll(clock.now()), Some("page 3"));
//! ```

mod cancel;
mod clock;
mod debounce;

pub use cancel::{CancellationRegistry, CancellationToken};
pub use clock::{Clock, ManualClock, SystemClock};
pub use debounce::Debounce;
