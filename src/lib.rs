//! MargaNav - navigation daemon for semi-autonomous field survey vehicles.
//!
//! Plans and continuously re-plans safe routes through fields with unseen
//! hazards, and serves an operator console over a slow, lossy serial link:
//! detect, register obstacle, back off, replan, transmit, move, telemetry.

pub mod config;
pub mod error;
pub mod geo;
pub mod mission;
pub mod planning;
pub mod protocol;
pub mod shared;
pub mod threads;
pub mod transport;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{NavError, Result};
