//! Device hotplug monitoring via udev

use log::trace;
use std::os::fd::{AsFd, BorrowedFd};
use std::path::PathBuf;

/// Event types for device hotplug
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// Device node appeared (e.g. "/dev/input/event5")
    Added(PathBuf),
    /// Device node went away
    Removed(PathBuf),
}

/// Source of device arrival/removal notifications.
///
/// The descriptor becomes readable when [`HotplugMonitor::poll_events`] has
/// something to return.
pub trait HotplugMonitor: AsFd {
    /// Take pending notifications without blocking
    fn poll_events(&mut self) -> Vec<DeviceEvent>;
}

/// Monitors the `input` subsystem for evdev nodes coming and going
pub struct UdevMonitor {
    socket: udev::MonitorSocket,
}

impl UdevMonitor {
    /// Create a new device monitor watching for input device events
    pub fn new() -> std::io::Result<Self> {
        // libudev hands out a non-blocking socket
        let socket = udev::MonitorBuilder::new()?
            .match_subsystem("input")?
            .listen()?;
        Ok(Self { socket })
    }
}

impl HotplugMonitor for UdevMonitor {
    fn poll_events(&mut self) -> Vec<DeviceEvent> {
        let mut events = Vec::new();

        for event in self.socket.iter() {
            // Only "event" nodes; js*, mouse* and parent devices are skipped
            let Some(devnode) = event.devnode() else {
                continue;
            };
            let is_evdev = devnode
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.starts_with("event"));
            if !is_evdev {
                continue;
            }

            trace!("udev {:?} {}", event.event_type(), devnode.display());
            match event.event_type() {
                udev::EventType::Add => events.push(DeviceEvent::Added(devnode.to_path_buf())),
                udev::EventType::Remove => {
                    events.push(DeviceEvent::Removed(devnode.to_path_buf()))
                }
                _ => {}
            }
        }

        events
    }
}

impl AsFd for UdevMonitor {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.socket.as_fd()
    }
}
