//! Filesystem driver capability and the driver registry.
//!
//! A driver does two things: recognise its on-disk format on a device
//! ([`FsDriver::identify`]) and build a [`Volume`] from that device
//! ([`FsDriver::mount`]). The [`DriverRegistry`] keeps drivers in
//! registration order and answers "which driver understands this device?"
//! by asking each in turn.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use crate::volume::Volume;
use crate::{FsError, Node};

/// A filesystem driver.
pub trait FsDriver: Send + Sync {
    /// Filesystem type name, e.g. `"fat"`.
    fn name(&self) -> &'static str;

    /// Returns `true` if `device` holds a filesystem this driver can mount.
    ///
    /// Must only read from the device.
    fn identify(&self, device: &dyn Node) -> bool;

    /// Mounts the filesystem on `device` as a volume called `name`.
    ///
    /// The returned volume's name must be `name`.
    ///
    /// # Errors
    ///
    /// Returns whatever prevented the driver from reading the filesystem.
    fn mount(&self, device: &Arc<dyn Node>, name: &str) -> Result<Volume, FsError>;
}

/// Errors from driver registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// A driver with the same name is already registered.
    AlreadyRegistered,
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRegistered => f.write_str("driver already registered"),
        }
    }
}

/// Ordered set of filesystem drivers.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: Vec<Arc<dyn FsDriver>>,
}

impl DriverRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `driver`; earlier drivers are asked first by [`identify`](Self::identify).
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::AlreadyRegistered`] if a driver with the same
    /// name is present.
    pub fn register(&mut self, driver: Arc<dyn FsDriver>) -> Result<(), DriverError> {
        if self.find(driver.name()).is_some() {
            keel_core::kwarn!("fs: driver '{}' already registered", driver.name());
            return Err(DriverError::AlreadyRegistered);
        }
        keel_core::kdebug!("fs: registered driver '{}'", driver.name());
        self.drivers.push(driver);
        Ok(())
    }

    /// Returns the driver called `name`.
    pub fn find(&self, name: &str) -> Option<Arc<dyn FsDriver>> {
        self.drivers.iter().find(|d| d.name() == name).cloned()
    }

    /// Returns the first registered driver that recognises `device`.
    ///
    /// Drivers after the first match are not probed.
    pub fn identify(&self, device: &dyn Node) -> Option<Arc<dyn FsDriver>> {
        self.drivers.iter().find(|d| d.identify(device)).cloned()
    }

    /// Returns the registered driver names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.drivers.iter().map(|d| d.name())
    }

    /// Returns the number of registered drivers.
    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    /// Returns `true` if no drivers are registered.
    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devfs::RamDevice;
    use crate::ramfs::RamDir;
    use core::sync::atomic::{AtomicUsize, Ordering};

    struct Magic {
        name: &'static str,
        magic: &'static [u8],
        probes: AtomicUsize,
    }

    impl Magic {
        fn new(name: &'static str, magic: &'static [u8]) -> Arc<Self> {
            Arc::new(Self {
                name,
                magic,
                probes: AtomicUsize::new(0),
            })
        }
    }

    impl FsDriver for Magic {
        fn name(&self) -> &'static str {
            self.name
        }

        fn identify(&self, device: &dyn Node) -> bool {
            self.probes.fetch_add(1, Ordering::Relaxed);
            let mut buf = [0u8; 4];
            device.read(0, &mut buf) == Ok(self.magic.len()) && buf[..] == *self.magic
        }

        fn mount(&self, _device: &Arc<dyn Node>, name: &str) -> Result<Volume, FsError> {
            Ok(Volume::new(self.name, RamDir::new(name)))
        }
    }

    #[test]
    fn identify_returns_first_match_in_registration_order() {
        let first = Magic::new("first", b"KFS1");
        let second = Magic::new("second", b"KFS1");
        let mut drivers = DriverRegistry::new();
        drivers.register(first.clone()).unwrap();
        drivers.register(second.clone()).unwrap();

        let dev = RamDevice::new("ram0", *b"KFS1");
        assert_eq!(drivers.identify(&*dev).unwrap().name(), "first");
        assert_eq!(second.probes.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn identify_none_when_no_driver_matches() {
        let mut drivers = DriverRegistry::new();
        drivers.register(Magic::new("kfs", b"KFS1")).unwrap();
        drivers.register(Magic::new("xfs", b"XFSB")).unwrap();

        let dev = RamDevice::new("ram0", *b"NOPE");
        assert!(drivers.identify(&*dev).is_none());
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut drivers = DriverRegistry::new();
        drivers.register(Magic::new("kfs", b"KFS1")).unwrap();
        assert_eq!(
            drivers.register(Magic::new("kfs", b"KFS2")),
            Err(DriverError::AlreadyRegistered)
        );
        assert_eq!(drivers.len(), 1);
        assert_eq!(drivers.names().collect::<Vec<_>>(), ["kfs"]);
    }

    #[test]
    fn find_by_name() {
        let mut drivers = DriverRegistry::new();
        assert!(drivers.is_empty());
        drivers.register(Magic::new("kfs", b"KFS1")).unwrap();
        assert!(drivers.find("kfs").is_some());
        assert!(drivers.find("fat").is_none());
    }
}
