//! Input event types and decoding of raw kernel event records

use nix::libc;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Kernel event type number for keys and buttons
pub const EV_KEY: u16 = 0x01;
/// Kernel event type number for switches (lid, tablet mode, headphone jack...)
pub const EV_SW: u16 = 0x05;

/// Size of one `struct input_event` as written by the kernel
pub const RECORD_SIZE: usize = std::mem::size_of::<libc::input_event>();

/// Width of each `timeval` half (`tv_sec`, `tv_usec`)
const TIME_FIELD_SIZE: usize = std::mem::size_of::<libc::c_long>();
/// Offset of `type`; `code` follows at +2 and `value` at +4
const TYPE_OFFSET: usize = 2 * TIME_FIELD_SIZE;

/// Class of an input event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventClass {
    /// Keys and buttons (`EV_KEY`)
    Key,
    /// Switches (`EV_SW`)
    Switch,
    /// Anything else (sync, relative, absolute, misc...)
    Other(u16),
}

impl EventClass {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            EV_KEY => Self::Key,
            EV_SW => Self::Switch,
            other => Self::Other(other),
        }
    }

    pub fn as_raw(self) -> u16 {
        match self {
            Self::Key => EV_KEY,
            Self::Switch => EV_SW,
            Self::Other(raw) => raw,
        }
    }

    /// Class a symbolic name belongs to, judged by its prefix
    pub fn for_name(name: &str) -> Self {
        if name.starts_with("SW_") {
            Self::Switch
        } else {
            Self::Key
        }
    }

    /// Whether events of this class take part in key state tracking
    pub fn is_tracked(self) -> bool {
        matches!(self, Self::Key | Self::Switch)
    }

    /// Label used in dump output
    pub fn label(self) -> &'static str {
        match self {
            Self::Key => "EV_KEY",
            Self::Switch => "EV_SW",
            Self::Other(_) => "EV_OTHER",
        }
    }
}

/// A numeric event code scoped by its class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventCode {
    pub class: EventClass,
    pub code: u16,
}

impl EventCode {
    pub fn new(class: EventClass, code: u16) -> Self {
        Self { class, code }
    }

    pub fn key(code: u16) -> Self {
        Self::new(EventClass::Key, code)
    }

    pub fn switch(code: u16) -> Self {
        Self::new(EventClass::Switch, code)
    }
}

/// A decoded input event
#[derive(Debug, Clone, PartialEq)]
pub struct InputEvent {
    /// Path of the device that produced the event
    pub device: Arc<Path>,
    /// Event class
    pub class: EventClass,
    /// Numeric code within the class
    pub code: u16,
    /// 0 = release, 1 = press, 2 = autorepeat for keys; 0/1 for switches
    pub value: i32,
    /// Kernel timestamp of the event
    pub timestamp: Duration,
}

impl InputEvent {
    pub fn new(
        device: Arc<Path>,
        class: EventClass,
        code: u16,
        value: i32,
        timestamp: Duration,
    ) -> Self {
        Self {
            device,
            class,
            code,
            value,
            timestamp,
        }
    }

    /// Class and code of this event
    pub fn event_code(&self) -> EventCode {
        EventCode::new(self.class, self.code)
    }
}

/// Decode one raw record. `bytes` must hold exactly [`RECORD_SIZE`] bytes.
pub fn decode_record(device: &Arc<Path>, bytes: &[u8]) -> Option<InputEvent> {
    if bytes.len() != RECORD_SIZE {
        return None;
    }

    let secs = read_time_field(&bytes[..TIME_FIELD_SIZE])?;
    let usecs = read_time_field(&bytes[TIME_FIELD_SIZE..TYPE_OFFSET])?;
    let raw_type = u16::from_ne_bytes(bytes[TYPE_OFFSET..TYPE_OFFSET + 2].try_into().ok()?);
    let code = u16::from_ne_bytes(bytes[TYPE_OFFSET + 2..TYPE_OFFSET + 4].try_into().ok()?);
    let value = i32::from_ne_bytes(bytes[TYPE_OFFSET + 4..TYPE_OFFSET + 8].try_into().ok()?);

    let timestamp = Duration::from_secs(secs.max(0) as u64)
        + Duration::from_micros(usecs.max(0) as u64);

    Some(InputEvent::new(
        Arc::clone(device),
        EventClass::from_raw(raw_type),
        code,
        value,
        timestamp,
    ))
}

/// Encode a record the way the kernel lays it out.
///
/// Used to feed synthetic devices (pipes, capture files).
pub fn encode_record(class: EventClass, code: u16, value: i32, timestamp: Duration) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(RECORD_SIZE);
    write_time_field(&mut bytes, timestamp.as_secs() as i64);
    write_time_field(&mut bytes, i64::from(timestamp.subsec_micros()));
    bytes.extend_from_slice(&class.as_raw().to_ne_bytes());
    bytes.extend_from_slice(&code.to_ne_bytes());
    bytes.extend_from_slice(&value.to_ne_bytes());
    bytes.resize(RECORD_SIZE, 0);
    bytes
}

fn read_time_field(bytes: &[u8]) -> Option<i64> {
    if TIME_FIELD_SIZE == 8 {
        Some(i64::from_ne_bytes(bytes.try_into().ok()?))
    } else {
        Some(i64::from(i32::from_ne_bytes(bytes.try_into().ok()?)))
    }
}

fn write_time_field(out: &mut Vec<u8>, value: i64) {
    if TIME_FIELD_SIZE == 8 {
        out.extend_from_slice(&value.to_ne_bytes());
    } else {
        out.extend_from_slice(&(value as i32).to_ne_bytes());
    }
}
