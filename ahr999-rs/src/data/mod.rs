//! Data management module
//!
//! Daily close series, trading pairs, and the history provider that fetches
//! and validates them.

pub mod history;
pub mod pair;
pub mod price;

pub use history::*;
pub use pair::*;
pub use price::*;
