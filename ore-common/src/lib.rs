//! # ORE Common Library
//!
//! Shared code for the ORE workspace:
//! - Error type used across crates
//! - Configuration loading (TOML, environment, root folder resolution)
//! - Engine event types and the broadcast event bus
//! - Clock abstraction for time-dependent logic

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
