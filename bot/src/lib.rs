pub mod config;
pub mod engine;
pub mod gateway;
pub mod platform;
