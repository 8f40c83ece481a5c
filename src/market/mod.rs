//! Market state module
//!
//! Exchange configuration, per-exchange trading pair state and oracle price
//! feeds. Each store is a cheaply cloneable handle over a shared DashMap.

pub mod exchanges;
pub mod feeds;
pub mod pairs;

pub use exchanges::ExchangeRegistry;
pub use feeds::{PriceFeedStore, PriceUpdate};
pub use pairs::TradingPairRegistry;
