//! Reload and terminate requests for the watch loop
//!
//! Requests set a flag and write a wake byte into a socket pair whose read
//! end sits in the watcher's poll set. Signal handlers only touch the flags
//! and the socket; the loop thread acts on them between wait cycles.

use log::debug;
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Error type for control channel setup
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("cannot create wake socket: {0}")]
    Socket(#[source] io::Error),
    #[error("cannot register signal handler: {0}")]
    Signal(#[source] io::Error),
}

/// Requests collected since the last drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Requests {
    pub reload: bool,
    pub terminate: bool,
}

/// Cloneable way to ask the watch loop to reload or stop
#[derive(Debug, Clone)]
pub struct ControlHandle {
    wake: Arc<UnixStream>,
    reload: Arc<AtomicBool>,
    terminate: Arc<AtomicBool>,
}

impl ControlHandle {
    pub fn request_reload(&self) {
        self.reload.store(true, Ordering::SeqCst);
        self.wake();
    }

    pub fn request_terminate(&self) {
        self.terminate.store(true, Ordering::SeqCst);
        self.wake();
    }

    fn wake(&self) {
        // A full socket already holds a pending wakeup
        let _ = (&*self.wake).write(&[1]);
    }
}

/// Receiving side owned by the watcher
#[derive(Debug)]
pub struct Control {
    wake_rx: UnixStream,
    handle: ControlHandle,
}

impl Control {
    pub fn new() -> Result<Self, ControlError> {
        let (wake_rx, wake_tx) = UnixStream::pair().map_err(ControlError::Socket)?;
        wake_rx.set_nonblocking(true).map_err(ControlError::Socket)?;
        wake_tx.set_nonblocking(true).map_err(ControlError::Socket)?;

        Ok(Self {
            wake_rx,
            handle: ControlHandle {
                wake: Arc::new(wake_tx),
                reload: Arc::new(AtomicBool::new(false)),
                terminate: Arc::new(AtomicBool::new(false)),
            },
        })
    }

    pub fn handle(&self) -> ControlHandle {
        self.handle.clone()
    }

    /// Route SIGHUP to reload and SIGINT/SIGTERM to terminate.
    pub fn install_signal_handlers(&self) -> Result<(), ControlError> {
        let routes = [
            (SIGHUP, &self.handle.reload),
            (SIGINT, &self.handle.terminate),
            (SIGTERM, &self.handle.terminate),
        ];
        for (signal, flag) in routes {
            // Flag first so the loop sees it when woken by the byte
            signal_hook::flag::register(signal, Arc::clone(flag)).map_err(ControlError::Signal)?;
            let wake = self.handle.wake.try_clone().map_err(ControlError::Socket)?;
            signal_hook::low_level::pipe::register(signal, wake).map_err(ControlError::Signal)?;
        }
        Ok(())
    }

    /// Consume wake bytes and take the pending requests
    pub fn drain(&self) -> Requests {
        let mut buf = [0u8; 64];
        loop {
            match (&self.wake_rx).read(&mut buf) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }

        let requests = Requests {
            reload: self.handle.reload.swap(false, Ordering::SeqCst),
            terminate: self.handle.terminate.swap(false, Ordering::SeqCst),
        };
        if requests != Requests::default() {
            debug!("control requests: {:?}", requests);
        }
        requests
    }
}

impl AsFd for Control {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.wake_rx.as_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_pending_by_default() {
        let control = Control::new().unwrap();
        assert_eq!(control.drain(), Requests::default());
    }

    #[test]
    fn requests_are_taken_once() {
        let control = Control::new().unwrap();
        let handle = control.handle();
        handle.request_reload();
        handle.request_terminate();

        assert_eq!(
            control.drain(),
            Requests {
                reload: true,
                terminate: true
            }
        );
        assert_eq!(control.drain(), Requests::default());
    }

    #[test]
    fn hangup_requests_reload_and_term_requests_stop() {
        let control = Control::new().unwrap();
        control.install_signal_handlers().unwrap();

        signal_hook::low_level::raise(SIGHUP).unwrap();
        assert_eq!(
            control.drain(),
            Requests {
                reload: true,
                terminate: false
            }
        );

        signal_hook::low_level::raise(SIGTERM).unwrap();
        assert_eq!(
            control.drain(),
            Requests {
                reload: false,
                terminate: true
            }
        );
    }

    #[test]
    fn handle_works_from_another_thread() {
        let control = Control::new().unwrap();
        let handle = control.handle();
        std::thread::spawn(move || handle.request_reload())
            .join()
            .unwrap();

        assert!(control.drain().reload);
    }
}
