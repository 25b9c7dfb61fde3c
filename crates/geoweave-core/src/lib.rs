//! Geoweave Core - Domain models, ports, and configuration
//!
//! This crate contains the value objects, port definitions and the reactive
//! primitive shared by the Geoweave session, lineage and storage crates.

pub mod config;
pub mod error;
pub mod models;
pub mod ports;
pub mod reactive;

pub use error::{GeoweaveError, Result};
