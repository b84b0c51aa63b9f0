pub mod bootstrap;
pub mod cli;
pub mod collector;
pub mod config;
pub mod error;
pub mod http;
pub mod metrics;
pub mod quota;
pub mod reporter;
pub mod server;
pub mod tracker;
pub mod types;
