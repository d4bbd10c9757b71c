//! Toolshowcase - a catalog of 3D tool models
//!
//! This crate provides the data-access core of the catalog: a record mapper,
//! interchangeable storage adapters behind one request router, a polling sync
//! controller, and the function-style HTTP service one of the adapters talks to.

pub mod config;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod kv;
pub mod mapper;
pub mod router;
pub mod routes;
pub mod state;
pub mod storage;
pub mod sync;

// Re-export commonly used types
pub use config::Config;
pub use entity::{Tool, ToolInput, ToolPatch};
pub use error::{AppError, AppResult};
pub use router::{Envelope, Request, RequestRouter};
pub use state::AppState;
pub use sync::{SyncController, SyncHandle, SyncState};
