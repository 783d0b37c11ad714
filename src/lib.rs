pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod password;
pub mod report;
pub mod storage;
pub mod telemetry;
pub mod token;
