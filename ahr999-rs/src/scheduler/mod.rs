//! Scheduling module
//!
//! A pure trigger calculation plus a cancellable sleep loop around it.

pub mod clock;
pub mod daily;

pub use clock::*;
pub use daily::*;
