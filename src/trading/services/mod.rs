pub mod audit_service;
pub mod trade_service;
