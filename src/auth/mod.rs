pub mod middleware;
pub mod mount;
pub mod profile;
pub mod providers;
pub mod strategy;
pub mod token_store;
