//! Session-side services: D-Bus clients, the config watcher and the
//! schedule driver.

pub mod config_manager;
pub mod download_service;
pub mod network_manager;
pub mod notifier;
