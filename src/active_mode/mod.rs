pub mod config;
pub mod cooldown;
pub mod counters;
pub mod detectors;
pub mod engine;
pub mod feeds;
pub mod handlers;
pub mod proximity;
pub mod registry;
pub mod shared;
pub mod source;
pub mod trace;
pub mod types;
pub mod window;
