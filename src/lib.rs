//! environmental telemetry dashboard
//!
//! a postgres-backed endpoint serves the newest reading; a monitor polls it,
//! keeps a rolling window per metric, raises threshold alerts and draws
//! detection overlays; the web server renders the result.

pub mod alerts;
pub mod config;
pub mod detect;
pub mod display;
pub mod domain;
pub mod error;
pub mod image;
pub mod logging;
pub mod monitor;
pub mod notify;
pub mod overlay;
pub mod render;
pub mod round;
pub mod series;
pub mod server;
pub mod source;
pub mod store;
