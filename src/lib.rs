pub mod api;
pub mod config;
pub mod db;
pub mod lifecycle;
pub mod logging;
