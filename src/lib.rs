// ShrimpScale - Library Entry Point
//
// Measurement-to-record pipeline: an ONNX shrimp detector feeding a sampling
// session, with offline-first persistence (local SQLite as source of truth,
// MongoDB as a best-effort mirror) and dual-source authentication.

pub mod auth;
pub mod config;
pub mod constants;
pub mod db;
pub mod detect;
pub mod error;
pub mod remote;
pub mod session;
pub mod sync;

pub use config::RemoteConfig;
pub use error::{Result, ShrimpScaleError};
