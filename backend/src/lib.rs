pub mod api;
pub mod config;
pub mod datatables;
pub mod db;
pub mod error;
pub mod import;
pub mod metrics;
pub mod password;
pub mod player;
pub mod sql;
