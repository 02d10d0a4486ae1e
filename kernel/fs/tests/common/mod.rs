//! Fixtures shared by the volume manager integration tests.

#![allow(dead_code)]

use std::fmt;
use std::sync::{Arc, Mutex};

use keel_core::log::{self, LogLevel};
use keel_fs::devfs::{DevFs, RamDevice};
use keel_fs::ramfs::RamDir;
use keel_fs::{DriverRegistry, FsDriver, FsError, Node, Volume};

pub const KFS_MAGIC: &[u8; 4] = b"KFS1";

/// Recognises devices whose image starts with [`KFS_MAGIC`] and records the
/// name of every device it is asked to identify.
#[derive(Default)]
pub struct KfsDriver {
    probed: Mutex<Vec<String>>,
}

impl KfsDriver {
    pub fn probed(&self) -> Vec<String> {
        self.probed.lock().unwrap().clone()
    }
}

impl FsDriver for KfsDriver {
    fn name(&self) -> &'static str {
        "kfs"
    }

    fn identify(&self, device: &dyn Node) -> bool {
        self.probed.lock().unwrap().push(device.name().to_string());
        let mut magic = [0u8; 4];
        device.read(0, &mut magic) == Ok(4) && magic == *KFS_MAGIC
    }

    fn mount(&self, _device: &Arc<dyn Node>, name: &str) -> Result<Volume, FsError> {
        Ok(Volume::new("kfs", RamDir::new(name)))
    }
}

/// A namespace `/` with `/dev` populated from `(name, image)` pairs.
pub struct Namespace {
    pub root: Arc<dyn Node>,
    pub devfs: DevFs,
}

impl Namespace {
    pub fn new(devices: &[(&str, &[u8; 4])]) -> Self {
        let root = RamDir::new("/");
        let devfs = DevFs::new();
        for (name, image) in devices {
            devfs.register(RamDevice::new(*name, image.to_vec())).unwrap();
        }
        root.add_child(devfs.root()).unwrap();
        Self { root, devfs }
    }

    pub fn device(&self, name: &str) -> Arc<dyn Node> {
        self.devfs.root().lookup(name).unwrap()
    }
}

/// Returns a registry holding only `driver`.
pub fn drivers_with(driver: Arc<KfsDriver>) -> DriverRegistry {
    let mut drivers = DriverRegistry::new();
    drivers.register(driver).unwrap();
    drivers
}

static RECORDS: Mutex<Vec<(LogLevel, String)>> = Mutex::new(Vec::new());

fn record(level: LogLevel, args: fmt::Arguments<'_>) {
    RECORDS.lock().unwrap().push((level, args.to_string()));
}

/// Routes kernel log records into an in-memory buffer.
pub fn capture_logs() {
    // SAFETY: `record` only takes a std mutex and never logs.
    unsafe { log::set_log_fn(record) };
}

/// Drains and returns the records captured so far.
pub fn take_logs() -> Vec<(LogLevel, String)> {
    std::mem::take(&mut *RECORDS.lock().unwrap())
}
