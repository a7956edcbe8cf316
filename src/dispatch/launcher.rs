//! Fire-and-forget command launching
//!
//! Launched children are handed to a background reaper thread that polls
//! them with `try_wait`, so finished commands never linger as zombies and
//! the event loop never waits on a child.

use log::{debug, warn};
use std::io;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// How often outstanding children are checked for exit
const REAP_INTERVAL: Duration = Duration::from_millis(250);

/// Error type for command launches
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The rule had no program to run
    #[error("empty command")]
    EmptyCommand,
    /// The program could not be started
    #[error("cannot run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    /// The reaper thread could not be started
    #[error("cannot start child reaper: {0}")]
    Reaper(#[source] io::Error),
}

/// Starts commands without waiting for them
pub trait Launcher {
    /// Start `command[0]` with the remaining elements as arguments
    fn launch(&mut self, command: &[String]) -> Result<(), LaunchError>;
}

/// Runs commands as child processes
pub struct ProcessLauncher {
    reaper: Sender<Child>,
    /// Children the reaper thread could not take
    orphans: Vec<Child>,
}

impl ProcessLauncher {
    pub fn new() -> Result<Self, LaunchError> {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("reaper".to_string())
            .spawn(move || reap(rx))
            .map_err(LaunchError::Reaper)?;
        Ok(Self::with_reaper(tx))
    }

    fn with_reaper(reaper: Sender<Child>) -> Self {
        Self {
            reaper,
            orphans: Vec::new(),
        }
    }

    fn reap_orphans(&mut self) {
        self.orphans.retain_mut(|child| matches!(child.try_wait(), Ok(None)));
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&mut self, command: &[String]) -> Result<(), LaunchError> {
        let (program, args) = command.split_first().ok_or(LaunchError::EmptyCommand)?;
        self.reap_orphans();

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: program.clone(),
                source,
            })?;

        debug!("Started {} (pid {})", program, child.id());
        if let Err(mpsc::SendError(child)) = self.reaper.send(child) {
            warn!(
                "child reaper has stopped; pid {} will be reaped on a later launch",
                child.id()
            );
            self.orphans.push(child);
        }
        Ok(())
    }
}

fn reap(rx: Receiver<Child>) {
    let mut children: Vec<Child> = Vec::new();
    let mut connected = true;

    while connected || !children.is_empty() {
        let next = if children.is_empty() {
            rx.recv().map_err(|_| RecvTimeoutError::Disconnected)
        } else if connected {
            rx.recv_timeout(REAP_INTERVAL)
        } else {
            thread::sleep(REAP_INTERVAL);
            Err(RecvTimeoutError::Timeout)
        };

        match next {
            Ok(child) => children.push(child),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => connected = false,
        }

        children.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                debug!("pid {} exited: {}", child.id(), status);
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!("cannot wait for pid {}: {}", child.id(), e);
                false
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_command_is_rejected() {
        let mut launcher = ProcessLauncher::new().unwrap();
        assert!(matches!(launcher.launch(&[]), Err(LaunchError::EmptyCommand)));
    }

    #[test]
    fn missing_program_is_reported() {
        let mut launcher = ProcessLauncher::new().unwrap();
        let result = launcher.launch(&["/nonexistent/evtrigger-test-binary".to_string()]);
        assert!(matches!(result, Err(LaunchError::Spawn { .. })));
    }

    #[test]
    fn children_are_kept_when_reaper_is_gone() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let mut launcher = ProcessLauncher::with_reaper(tx);

        launcher.launch(&["true".to_string()]).unwrap();
        assert_eq!(launcher.orphans.len(), 1);

        let started = std::time::Instant::now();
        while !launcher.orphans.is_empty() && started.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(20));
            launcher.reap_orphans();
        }
        assert!(launcher.orphans.is_empty());
    }

    #[test]
    fn launch_does_not_wait_for_child() {
        let mut launcher = ProcessLauncher::new().unwrap();
        let started = std::time::Instant::now();
        launcher
            .launch(&["sleep".to_string(), "2".to_string()])
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
