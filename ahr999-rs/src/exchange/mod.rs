//! Exchange integration module
//!
//! A [`Venue`] per supported exchange, built through [`build_venue`].

pub mod binance;
pub mod bitget;
pub mod connectivity;
pub mod factory;
mod http;
pub mod okx;
pub mod order;
pub mod signing;
pub mod venue;

pub use binance::BinanceVenue;
pub use bitget::BitgetVenue;
pub use connectivity::*;
pub use factory::*;
pub use okx::OkxVenue;
pub use order::*;
pub use venue::*;
