//! Hathor dice — bet settlement engine for a nano-contract dice game.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod clients;
pub mod config;
pub mod engine;
pub mod odds;
pub mod storage;
pub mod types;
