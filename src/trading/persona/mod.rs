pub mod decision;
pub mod prompt;
pub mod strategy;
