//! Watcher over a fixed list of devices

use super::{
    Control, ControlHandle, DeviceWatcher, DumpOutput, EventListener, Multiplexer, WatchError,
};
use crate::input::{DeviceSource, EventCodeTable};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Watches exactly the devices it was given
pub struct StaticWatcher {
    mux: Multiplexer,
}

impl StaticWatcher {
    pub fn new(control: Control, codes: Arc<EventCodeTable>) -> Self {
        Self {
            mux: Multiplexer::new(control, codes),
        }
    }

    /// Open every listed device. Any device that can't be opened is fatal.
    pub fn open(
        paths: &[PathBuf],
        control: Control,
        codes: Arc<EventCodeTable>,
    ) -> Result<Self, WatchError> {
        let mut watcher = Self::new(control, codes);
        for path in paths {
            watcher.add_source(DeviceSource::open(path)?);
        }
        Ok(watcher)
    }

    pub fn control_handle(&self) -> ControlHandle {
        self.mux.control_handle()
    }

    pub fn watched_devices(&self) -> Vec<&Path> {
        self.mux.watched_devices()
    }
}

impl DeviceWatcher for StaticWatcher {
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
        info!("Watching {} device(s)", self.mux.watched_devices().len());
        loop {
            let wakeup = self.mux.wait(None)?;
            if wakeup.requests.reload {
                // Restart: the next wait rebuilds the poll set from the
                // sources still open.
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputEvent;
    use crate::watcher::test_support::{key_record, pipe_source, Recording, SharedBuf};
    use std::cell::RefCell;
    use std::io::Write;
    use std::rc::Rc;

    fn codes() -> Arc<EventCodeTable> {
        Arc::new(EventCodeTable::parse("KEY_A 30\nKEY_B 48\n"))
    }

    type Seen = Rc<RefCell<Vec<InputEvent>>>;

    fn recording(watcher: &StaticWatcher, limit: usize) -> (Recording, Seen, Rc<RefCell<usize>>) {
        let events = Rc::new(RefCell::new(Vec::new()));
        let reloads = Rc::new(RefCell::new(0));
        let listener = Recording {
            events: Rc::clone(&events),
            reloads: Rc::clone(&reloads),
            limit,
            handle: watcher.control_handle(),
        };
        (listener, events, reloads)
    }

    #[test]
    fn delivers_events_in_read_order() {
        let mut watcher = StaticWatcher::new(Control::new().unwrap(), codes());
        let (source, mut writer) = pipe_source("/test/kbd");
        watcher.add_source(source);
        let (listener, events, _) = recording(&watcher, 3);
        watcher.add_listener(Box::new(listener));

        for (code, value) in [(30, 1), (48, 1), (30, 0)] {
            writer.write_all(&key_record(code, value)).unwrap();
        }
        watcher.watch().unwrap();

        let seen: Vec<(u16, i32)> = events.borrow().iter().map(|e| (e.code, e.value)).collect();
        assert_eq!(seen, vec![(30, 1), (48, 1), (30, 0)]);
    }

    #[test]
    fn ended_source_is_retired_and_others_keep_going() {
        let mut watcher = StaticWatcher::new(Control::new().unwrap(), codes());
        let (gone, gone_writer) = pipe_source("/test/gone");
        let (kept, mut kept_writer) = pipe_source("/test/kept");
        watcher.add_source(gone);
        watcher.add_source(kept);
        let (listener, events, _) = recording(&watcher, 1);
        watcher.add_listener(Box::new(listener));

        drop(gone_writer);
        kept_writer.write_all(&key_record(30, 1)).unwrap();
        watcher.watch().unwrap();

        assert_eq!(events.borrow().len(), 1);
        assert_eq!(watcher.watched_devices(), vec![Path::new("/test/kept")]);
    }

    #[test]
    fn reload_request_reaches_listeners() {
        let mut watcher = StaticWatcher::new(Control::new().unwrap(), codes());
        let (source, mut writer) = pipe_source("/test/kbd");
        watcher.add_source(source);
        let (listener, _, reloads) = recording(&watcher, 1);
        watcher.add_listener(Box::new(listener));

        watcher.control_handle().request_reload();
        writer.write_all(&key_record(30, 1)).unwrap();
        watcher.watch().unwrap();

        assert_eq!(*reloads.borrow(), 1);
        assert_eq!(watcher.watched_devices().len(), 1);
    }

    #[test]
    fn dump_renders_each_event_once() {
        let mut watcher = StaticWatcher::new(Control::new().unwrap(), codes());
        let (source, mut writer) = pipe_source("/test/kbd");
        watcher.add_source(source);
        let dump = SharedBuf::default();
        watcher.set_dump_output(DumpOutput::new(Box::new(dump.clone())));
        watcher.set_dump(true);
        let (listener, _, _) = recording(&watcher, 2);
        watcher.add_listener(Box::new(listener));

        writer.write_all(&key_record(30, 1)).unwrap();
        writer.write_all(&key_record(99, 0)).unwrap();
        watcher.watch().unwrap();

        let output = String::from_utf8(dump.0.borrow().clone()).unwrap();
        assert_eq!(output, "EV_KEY\tKEY_A\t1\t/test/kbd\nEV_KEY\t99\t0\t/test/kbd\n");
    }

    #[test]
    fn open_fails_on_missing_device() {
        let result = StaticWatcher::open(
            &[PathBuf::from("/nonexistent/input/event42")],
            Control::new().unwrap(),
            codes(),
        );
        assert!(matches!(result, Err(WatchError::Device(_))));
    }
}
