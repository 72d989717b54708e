pub mod append_log;
pub mod catalog;
pub mod config;
pub mod index;
pub mod schema;
pub mod storage_manager;
pub mod table;
