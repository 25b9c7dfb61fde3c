//! Geoweave Client - HTTP adapter for the backend port
//!
//! This crate implements [`geoweave_core::ports::Backend`] against the
//! REST interface of a remote geo engine.

pub mod http;

pub use http::HttpBackend;
