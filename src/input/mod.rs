//! Input event handling: decoding, device sources, code names and key state

pub mod codes;
pub mod device;
mod event;
mod state;

pub use codes::{CodeTableError, EventCodeTable};
pub use device::{DeviceError, DeviceSource, Drained};
pub use event::{decode_record, encode_record, EventClass, EventCode, InputEvent, RECORD_SIZE};
pub use state::ActiveKeySet;
