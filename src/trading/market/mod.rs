pub mod finnhub_client;
pub mod price_cache;
pub mod snapshot;
