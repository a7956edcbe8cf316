//! Watcher that follows devices as they are plugged and unplugged

use super::{
    Control, ControlHandle, DeviceEvent, DeviceWatcher, DumpOutput, EventListener,
    HotplugMonitor, Multiplexer, UdevMonitor, WatchError,
};
use crate::input::device::{enumerate_event_devices, INPUT_DIR};
use crate::input::{DeviceError, DeviceSource, EventCodeTable};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Opens a device that was announced by the monitor
pub type DeviceOpener = fn(&Path) -> Result<DeviceSource, DeviceError>;

fn open_key_or_switch_device(path: &Path) -> Result<DeviceSource, DeviceError> {
    DeviceSource::open_if_capable(path)
}

/// Watches every key/switch device, adding and retiring sources at runtime.
///
/// Notifications are applied between wait cycles, never while the poll set
/// is in use.
pub struct DynamicWatcher<M: HotplugMonitor> {
    mux: Multiplexer,
    monitor: M,
    input_dir: Option<PathBuf>,
    open_device: DeviceOpener,
}

impl DynamicWatcher<UdevMonitor> {
    /// Subscribe to udev and watch devices already present in `/dev/input`
    pub fn new(control: Control, codes: Arc<EventCodeTable>) -> Result<Self, WatchError> {
        let monitor = UdevMonitor::new().map_err(WatchError::Hotplug)?;
        Ok(Self::with_monitor(monitor, control, codes).with_input_dir(Some(INPUT_DIR.into())))
    }
}

impl<M: HotplugMonitor> DynamicWatcher<M> {
    /// Watcher driven by any monitor; no initial device scan
    pub fn with_monitor(monitor: M, control: Control, codes: Arc<EventCodeTable>) -> Self {
        Self {
            mux: Multiplexer::new(control, codes),
            monitor,
            input_dir: None,
            open_device: open_key_or_switch_device,
        }
    }

    /// Directory scanned for existing devices when `watch` starts
    pub fn with_input_dir(mut self, input_dir: Option<PathBuf>) -> Self {
        self.input_dir = input_dir;
        self
    }

    pub fn with_device_opener(mut self, open_device: DeviceOpener) -> Self {
        self.open_device = open_device;
        self
    }

    pub fn control_handle(&self) -> ControlHandle {
        self.mux.control_handle()
    }

    pub fn watched_devices(&self) -> Vec<&Path> {
        self.mux.watched_devices()
    }

    fn scan_existing(&mut self) {
        let Some(dir) = self.input_dir.clone() else {
            return;
        };
        match enumerate_event_devices(&dir) {
            Ok(paths) => {
                for path in paths {
                    self.attach(&path);
                }
            }
            Err(e) => warn!("Cannot list {}: {}", dir.display(), e),
        }
    }

    fn attach(&mut self, path: &Path) {
        if self.mux.has_source(path) {
            return;
        }
        match (self.open_device)(path) {
            Ok(source) => self.mux.add_source(source),
            Err(DeviceError::NotKeyOrSwitch(_)) => {}
            Err(e) => warn!("Not watching {}: {}", path.display(), e),
        }
    }

    fn apply(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Added(path) => self.attach(&path),
            DeviceEvent::Removed(path) => {
                self.mux.remove_source(&path);
            }
        }
    }
}

impl<M: HotplugMonitor> DeviceWatcher for DynamicWatcher<M> {
    fn add_source(&mut self, source: DeviceSource) {
        self.mux.add_source(source);
    }

    fn add_listener(&mut self, listener: Box<dyn EventListener>) {
        self.mux.add_listener(listener);
    }

    fn set_dump(&mut self, dump: bool) {
        self.mux.set_dump(dump);
    }

    fn set_dump_output(&mut self, out: DumpOutput) {
        self.mux.set_dump_output(out);
    }

    fn watch(&mut self) -> Result<(), WatchError> {
        self.scan_existing();
        info!(
            "Watching {} device(s), following hotplug",
            self.mux.watched_devices().len()
        );

        loop {
            let wakeup = self.mux.wait(Some(self.monitor.as_fd()))?;
            if wakeup.extra_ready {
                for event in self.monitor.poll_events() {
                    self.apply(event);
                }
            }
            if wakeup.requests.reload {
                info!("Reload requested");
                self.mux.reload_listeners();
            }
            if wakeup.requests.terminate {
                info!("Stopping");
                return Ok(());
            }
        }
    }
}
