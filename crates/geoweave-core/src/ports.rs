//! Port trait definitions
//!
//! These traits define the interfaces that adapters must implement.

pub mod backend;
pub mod session;
pub mod storage;

pub use backend::{Backend, PlotQuery};
pub use session::{SessionTokenProvider, StaticSession};
pub use storage::StorageProvider;
