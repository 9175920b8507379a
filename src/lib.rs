//! Synthetic metric drift generator.
//!
//! One shared base signal is pushed through three team-specific
//! transformations (Finance, Product, Marketing). Each team applies its own
//! progressive drift, a one-off definition change and noise, so the "same"
//! metric ends up reported as several diverging values.

pub mod analysis;
pub mod config;
pub mod dates;
pub mod error;
pub mod events;
pub mod export;
pub mod logging;
pub mod simulation;
pub mod types;
