//! Key state and command dispatch

mod engine;
mod launcher;

pub use engine::DispatchEngine;
pub use launcher::{LaunchError, Launcher, ProcessLauncher};
