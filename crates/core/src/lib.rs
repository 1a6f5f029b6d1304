//! Core functionality shared across the Binroute dispatch workspace.
//!
//! This crate provides the fundamental types and utilities used by the
//! dispatch engine and its service surface: geographic points with
//! great-circle distance, wall-clock helpers, structured logging
//! initialisation and TOML configuration loading.

pub mod config;
pub mod error;
pub mod geo;
pub mod logging;
pub mod time;

pub use config::{load_toml, LogFormat};
pub use error::{CoreError, Result};
pub use geo::{GeoPoint, EARTH_RADIUS_M};
pub use time::{now_ms, MS_PER_HOUR, MS_PER_MINUTE};
