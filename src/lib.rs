pub mod app;
pub mod cli;
pub mod config;
pub mod gateway;
pub mod highlight;
pub mod hotkeys;
pub mod journaling;
pub mod notes;
pub mod scheduler;
pub mod search;
pub mod settings;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
