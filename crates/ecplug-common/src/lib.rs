//! ecplug Common - Shared types and utilities
//!
//! This crate provides the redundancy scheme (`ErasureSchema`), the raw coder
//! configuration store (`CoderConf`) and the common error type used by the
//! other ecplug crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::{CoderConf, keys};
pub use error::{Error, Result};
pub use types::*;
