pub mod config;
pub mod constants;
pub mod date;
pub mod error;
pub mod geocode;
pub mod http;
pub mod identity;
pub mod index;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod sources;
pub mod types;
