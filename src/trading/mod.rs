pub mod market;
pub mod market_calendar;
pub mod model;
pub mod openai;
pub mod persona;
pub mod services;
pub mod store;
pub mod task;
