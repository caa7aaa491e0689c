pub mod account;
pub mod holding;
pub mod instrument;
pub mod run_slot;
pub mod trading_log;
pub mod transaction;
