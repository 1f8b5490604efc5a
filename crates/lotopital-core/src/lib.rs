//! Core Lotopital admin library (session, content API, config).

pub mod api;
pub mod config;
pub mod cookies;
pub mod logging;
pub mod session;
