//! HTTP API for keyword intake and quiz handoff
//!
//! Provides:
//! - Keyword event intake for page scanners
//! - Tracking status and topic management
//! - Active quiz presentation, answer reveal and close
//! - Completion history and health

pub mod server;

pub use server::{router, ApiError, ApiServer, ApiState};
