pub mod classify;
pub mod config;
pub mod feeds;
pub mod logging;
