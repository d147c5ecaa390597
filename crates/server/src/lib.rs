//! Composition root and administrative HTTP surface for the voice
//! assistant runtime (§2, §6). The binary entry point lives in `main.rs`;
//! this crate exposes the pieces it wires together so integration tests
//! can assemble the same `AppState` without going through `main`.

pub mod components;
pub mod error;
pub mod http;
pub mod state;

pub use error::ServerError;
pub use http::create_router;
pub use state::{AppState, RuntimeComponents};
