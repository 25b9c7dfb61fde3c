//! Geoweave Store - Backend and storage adapters
//!
//! This crate provides in-memory implementations of the backend port and
//! storage providers that persist the working state in memory, in a
//! directory of JSON files or on the backend itself.

pub mod backend;
pub mod file;
pub mod memory;

pub use backend::BackendStorageProvider;
pub use file::FileStorageProvider;
pub use memory::{MemoryBackend, MemoryStorageProvider};
