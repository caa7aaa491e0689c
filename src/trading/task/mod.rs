pub mod price_sync_job;
pub mod trading_job;
