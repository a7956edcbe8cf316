//! Device watchers: multiplexed reads over device sources
//!
//! Both watcher variants share a [`Multiplexer`] that polls the device
//! descriptors plus the control socket, drains whatever is ready and hands
//! each event to every listener in turn. Listeners are always called from
//! the loop thread, one event at a time.

mod control;
mod dynamic;
pub mod hotplug;
mod static_watcher;

pub use control::{Control, ControlError, ControlHandle, Requests};
pub use dynamic::DynamicWatcher;
pub use hotplug::{DeviceEvent, HotplugMonitor, UdevMonitor};
pub use static_watcher::StaticWatcher;

use crate::input::{DeviceError, DeviceSource, EventCodeTable, InputEvent};
use log::{debug, info, warn};
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::cell::RefCell;
use std::io::{self, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;

/// Error type for watch loops
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("poll failed: {0}")]
    Poll(#[source] Errno),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Control(#[from] ControlError),
    #[error("cannot subscribe to device notifications: {0}")]
    Hotplug(#[source] io::Error),
}

/// Receives decoded key and switch events
pub trait EventListener {
    fn handle_event(&mut self, event: &InputEvent);

    /// Called on the loop thread when a reload was requested
    fn reload(&mut self) {}
}

/// Common contract of the static and hot-plug watchers
pub trait DeviceWatcher {
    fn add_source(&mut self, source: DeviceSource);
    fn add_listener(&mut self, listener: Box<dyn EventListener>);
    fn set_dump(&mut self, dump: bool);
    fn set_dump_output(&mut self, out: DumpOutput);

    /// Run until termination is requested or a fatal error occurs
    fn watch(&mut self) -> Result<(), WatchError>;
}

/// Writer shared by everything that prints in dump mode (stdout by default)
#[derive(Clone)]
pub struct DumpOutput(Rc<RefCell<Box<dyn Write>>>);

impl DumpOutput {
    pub fn new(out: Box<dyn Write>) -> Self {
        Self(Rc::new(RefCell::new(out)))
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Write one line and flush it
    pub fn write_line(&self, line: &str) {
        let mut out = self.0.borrow_mut();
        if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
            warn!("dump output failed: {}", e);
        }
    }
}

impl Default for DumpOutput {
    fn default() -> Self {
        Self::stdout()
    }
}

/// Render an event the way dump mode prints it
pub fn render_dump_line(event: &InputEvent, codes: &EventCodeTable) -> String {
    let name = codes
        .name_of(event.event_code())
        .map(str::to_string)
        .unwrap_or_else(|| event.code.to_string());
    format!(
        "{}\t{}\t{}\t{}",
        event.class.label(),
        name,
        event.value,
        event.device.display()
    )
}

/// What one wait cycle observed besides device events
#[derive(Debug, Default)]
pub(crate) struct Wakeup {
    pub extra_ready: bool,
    pub requests: Requests,
}

/// Poll set and listener fan-out shared by the watcher variants
pub struct Multiplexer {
    sources: Vec<DeviceSource>,
    listeners: Vec<Box<dyn EventListener>>,
    control: Control,
    codes: Arc<EventCodeTable>,
    dump: bool,
    dump_out: DumpOutput,
}

impl Multiplexer {
    pub fn new(control: Control, codes: Arc<EventCodeTable>) -> Self {
        Self {
            sources: Vec::new(),
            listeners: Vec::new(),
            control,
            codes,
            dump: false,
            dump_out: DumpOutput::stdout(),
        }
    }

    pub fn add_source(&mut self, source: DeviceSource) {
        info!("Watching {}", source.path().display());
        self.sources.push(source);
    }

    /// Stop watching a device. Returns whether it was watched.
    pub fn remove_source(&mut self, path: &Path) -> bool {
        let before = self.sources.len();
        self.sources.retain(|source| source.path() != path);
        let removed = self.sources.len() != before;
        if removed {
            info!("Stopped watching {}", path.display());
        }
        removed
    }

    pub fn has_source(&self, path: &Path) -> bool {
        self.sources.iter().any(|source| source.path() == path)
    }

    /// Paths of the watched devices
    pub fn watched_devices(&self) -> Vec<&Path> {
        self.sources.iter().map(DeviceSource::path).collect()
    }

    pub fn add_listener(&mut self, listener: Box<dyn EventListener>) {
        self.listeners.push(listener);
    }

    pub fn set_dump(&mut self, dump: bool) {
        self.dump = dump;
    }

    /// Send dump output somewhere other than stdout
    pub fn set_dump_output(&mut self, out: DumpOutput) {
        self.dump_out = out;
    }

    pub fn control_handle(&self) -> ControlHandle {
        self.control.handle()
    }

    /// Block until something is readable, then process it.
    ///
    /// `extra` is an additional descriptor (the hot-plug monitor) whose
    /// readiness is reported back rather than handled here.
    pub(crate) fn wait(&mut self, extra: Option<BorrowedFd<'_>>) -> Result<Wakeup, WatchError> {
        let ready = {
            let mut fds = Vec::with_capacity(self.sources.len() + 2);
            fds.push(PollFd::new(self.control.as_fd(), PollFlags::POLLIN));
            if let Some(fd) = extra {
                fds.push(PollFd::new(fd, PollFlags::POLLIN));
            }
            fds.extend(
                self.sources
                    .iter()
                    .map(|source| PollFd::new(source.as_fd(), PollFlags::POLLIN)),
            );

            loop {
                match poll(&mut fds, PollTimeout::NONE) {
                    Ok(_) => break,
                    Err(Errno::EINTR) => continue,
                    Err(e) => return Err(WatchError::Poll(e)),
                }
            }

            fds.iter()
                .map(|fd| {
                    fd.revents().is_some_and(|r| {
                        r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR)
                    })
                })
                .collect::<Vec<bool>>()
        };

        let offset = if extra.is_some() { 2 } else { 1 };
        let mut wakeup = Wakeup {
            extra_ready: extra.is_some() && ready[1],
            requests: Requests::default(),
        };

        let mut ended = Vec::new();
        for (index, source) in self.sources.iter_mut().enumerate() {
            if !ready[offset + index] {
                continue;
            }
            let drained = source.decode_ready_events();
            for event in &drained.events {
                Self::deliver(
                    &mut self.listeners,
                    self.dump,
                    &self.dump_out,
                    &self.codes,
                    event,
                );
            }
            if drained.end_of_source {
                ended.push(index);
            }
        }
        // Highest index first so earlier indices stay valid
        for index in ended.into_iter().rev() {
            let source = self.sources.remove(index);
            info!("{} went away", source.path().display());
        }

        if ready[0] {
            wakeup.requests = self.control.drain();
        }
        Ok(wakeup)
    }

    fn deliver(
        listeners: &mut [Box<dyn EventListener>],
        dump: bool,
        dump_out: &DumpOutput,
        codes: &EventCodeTable,
        event: &InputEvent,
    ) {
        if !event.class.is_tracked() {
            return;
        }
        if dump {
            dump_out.write_line(&render_dump_line(event, codes));
        }
        for listener in listeners.iter_mut() {
            listener.handle_event(event);
        }
    }

    /// Let every listener reload on the loop thread
    pub(crate) fn reload_listeners(&mut self) {
        debug!("Reloading {} listener(s)", self.listeners.len());
        for listener in &mut self.listeners {
            listener.reload();
        }
    }
}
