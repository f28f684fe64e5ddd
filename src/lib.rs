//! Caching DNS forwarder core: hosts table, dual-tier cache, suffix-routed
//! upstream race, and the query handler that ties them together. Wire
//! encoding is never hand-rolled here; it is delegated to `hickory-proto`
//! and `hickory-server`.

pub mod cache;
pub mod config;
pub mod error;
pub mod handler;
pub mod hosts;
pub mod listener;
pub mod logging;
pub mod message;
pub mod question;
pub mod resolver;
pub mod suffix;
