//! evtrigger - run commands on input device key and switch events
//!
//! Reads evdev devices, tracks which keys are held and launches the
//! commands bound to key combinations in the rule files.

pub mod config;
pub mod dispatch;
pub mod input;
pub mod rules;
pub mod watcher;

pub use config::Config;
