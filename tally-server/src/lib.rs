//! HTTP surface and operational tooling for the Tally payment core.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod telemetry;
pub mod tenant;

pub use app::{build_router, build_state, AppState, PageLimits};
