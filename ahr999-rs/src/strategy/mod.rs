//! Strategy module
//!
//! Maps an indicator snapshot onto a buy tier.

pub mod decision;

pub use decision::*;
