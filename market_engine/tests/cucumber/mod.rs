
pub use market_world::MarketWorld;
