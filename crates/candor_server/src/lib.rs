//! Candor board server: axum HTTP surface, SQLite persistence and the
//! process-lifecycle pieces (config, background sweeper) around
//! `candor_core`.

pub mod config;
pub mod db;
pub mod handlers;
pub mod identity;
pub mod sweeper;
