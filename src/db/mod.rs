// Database module
// SQLite storage for favorite tunes

pub mod connection;
pub mod migrations;
pub mod models;
pub mod operations;
