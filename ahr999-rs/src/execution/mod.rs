//! Execution module
//!
//! Runs fetch → compute → decide → execute once per day and keeps the
//! append-only record of what happened on each venue.

pub mod pipeline;
pub mod record;
pub mod retry;
pub mod shutdown;
pub mod store;

pub use pipeline::*;
pub use record::*;
pub use retry::*;
pub use shutdown::*;
pub use store::*;
