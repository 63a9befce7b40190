//! Soil-moisture telemetry hub: ingests sensor readings and device metadata over HTTP,
//! persists them in SQLite and serves them back, plus 3D model uploads for the dashboard.

pub mod api;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod logging;
pub mod repo;
pub mod schema;
pub mod server;
pub mod storage;
