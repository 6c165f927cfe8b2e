pub mod api;
pub mod bootstrap;
pub mod comments;
pub mod config;
pub mod database;
pub mod error;
pub mod identity;
pub mod photos;
pub mod posts;
pub mod telemetry;
pub mod utils;
pub mod votes;
