//! OpenSimReplay Server Library
//!
//! Exposes server components for integration testing.

pub mod api;
pub mod manager;
pub mod state;
pub mod storage;
