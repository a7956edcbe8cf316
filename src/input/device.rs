//! Raw input device sources for Linux
//!
//! A [`DeviceSource`] owns one non-blocking descriptor on an evdev node and
//! turns whatever records are ready into [`InputEvent`]s. Capability probing
//! and enumeration of `/dev/input` live here too.

use super::event::{decode_record, RECORD_SIZE};
use super::InputEvent;
use log::{debug, trace};
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::libc;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Default directory holding evdev nodes
pub const INPUT_DIR: &str = "/dev/input";

/// Error type for device operations
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Permission denied accessing device
    #[error("permission denied accessing {0} (run as root or add the user to the 'input' group)")]
    PermissionDenied(PathBuf),
    /// Device could not be opened
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Descriptor could not be switched to non-blocking mode
    #[error("cannot make {path} non-blocking: {source}")]
    NonBlocking {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },
    /// Device advertises neither keys nor switches
    #[error("{0} has no key or switch capability")]
    NotKeyOrSwitch(PathBuf),
}

impl DeviceError {
    fn open(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            DeviceError::PermissionDenied(path.to_path_buf())
        } else {
            DeviceError::Open {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Events read by one [`DeviceSource::decode_ready_events`] call
#[derive(Debug, Default)]
pub struct Drained {
    /// Decoded events in read order
    pub events: Vec<InputEvent>,
    /// The device is gone (EOF or read error); the source should be retired
    pub end_of_source: bool,
}

/// One watched input device
pub struct DeviceSource {
    path: Arc<Path>,
    file: File,
    buffer: Vec<u8>,
    pending: Vec<u8>,
}

impl DeviceSource {
    /// Open a device node for non-blocking reads
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DeviceError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .map_err(|e| DeviceError::open(path, e))?;

        debug!("Opened {}", path.display());
        Ok(Self::with_file(path, file))
    }

    /// Open a device only if it reports key or switch capability
    pub fn open_if_capable(path: impl AsRef<Path>) -> Result<Self, DeviceError> {
        let path = path.as_ref();
        let info = probe(path)?;
        if !info.has_keys && !info.has_switches {
            return Err(DeviceError::NotKeyOrSwitch(path.to_path_buf()));
        }
        debug!(
            "{} is {:?}",
            path.display(),
            info.name.as_deref().unwrap_or("an unnamed device")
        );
        Self::open(path)
    }

    /// Wrap an already open descriptor (pipe, capture file...)
    pub fn from_file(path: impl AsRef<Path>, file: File) -> Result<Self, DeviceError> {
        let path = path.as_ref();
        set_nonblocking(&file).map_err(|source| DeviceError::NonBlocking {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::with_file(path, file))
    }

    fn with_file(path: &Path, file: File) -> Self {
        Self {
            path: Arc::from(path),
            file,
            buffer: vec![0u8; RECORD_SIZE * 64], // Buffer for multiple events
            pending: Vec::new(),
        }
    }

    /// Path identifying this device
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record currently available and decode it.
    ///
    /// A zero-length read or any error other than "would block" marks the
    /// end of the source.
    pub fn decode_ready_events(&mut self) -> Drained {
        let mut drained = Drained::default();

        loop {
            match self.file.read(&mut self.buffer) {
                Ok(0) => {
                    debug!("{} reached end of input", self.path.display());
                    drained.end_of_source = true;
                    break;
                }
                Ok(bytes_read) => {
                    self.pending.extend_from_slice(&self.buffer[..bytes_read]);
                    self.decode_pending(&mut drained.events);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("{} read failed: {}", self.path.display(), e);
                    drained.end_of_source = true;
                    break;
                }
            }
        }

        drained
    }

    // Whole records only; a trailing fragment waits for the next read.
    fn decode_pending(&mut self, out: &mut Vec<InputEvent>) {
        let complete = self.pending.len() - self.pending.len() % RECORD_SIZE;
        for record in self.pending[..complete].chunks_exact(RECORD_SIZE) {
            if let Some(event) = decode_record(&self.path, record) {
                trace!("{:?}", event);
                out.push(event);
            }
        }
        self.pending.drain(..complete);
    }
}

impl AsFd for DeviceSource {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl std::fmt::Debug for DeviceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSource")
            .field("path", &self.path)
            .field("fd", &self.file.as_raw_fd())
            .finish()
    }
}

fn set_nonblocking(file: &File) -> nix::Result<()> {
    let fd = file.as_raw_fd();
    let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
    fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
    Ok(())
}

/// What a device says about itself
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    pub name: Option<String>,
    pub has_keys: bool,
    pub has_switches: bool,
}

/// Query a device's name and capabilities
pub fn probe(path: &Path) -> Result<DeviceInfo, DeviceError> {
    let device = evdev::Device::open(path).map_err(|e| DeviceError::open(path, e))?;
    let events = device.supported_events();

    Ok(DeviceInfo {
        name: device.name().map(str::to_string),
        has_keys: events.contains(evdev::EventType::KEY),
        has_switches: events.contains(evdev::EventType::SWITCH),
    })
}

/// List `event*` nodes in a directory, sorted by name
pub fn enumerate_event_devices(input_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut devices: Vec<PathBuf> = fs::read_dir(input_dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.starts_with("event"))
        })
        .collect();
    devices.sort();
    Ok(devices)
}
