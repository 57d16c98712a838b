//! Simulation feeds for OpenSimReplay

pub mod demo;

pub use demo::DemoRace;
