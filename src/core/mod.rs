pub mod aggregator;
pub mod clock;
pub mod config;
pub mod errors;
pub mod event_processor;
pub mod history;
pub mod monitor;
pub mod network;
pub mod simulator;
pub mod types;
