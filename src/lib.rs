// Library exports for yatube
// This allows integration tests and the binary to share the modules

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod display;
pub mod error;
pub mod extractors;
pub mod forms;
pub mod pagination;
pub mod routes;
pub mod state;
pub mod uploads;
