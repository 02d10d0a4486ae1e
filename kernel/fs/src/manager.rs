//! Volume manager: the registry of mounted volumes.
//!
//! The manager turns character devices into mounted [`Volume`]s, keeps them
//! in mount order, and brings up the system volume at boot by scanning
//! `/dev` for the first device some driver can mount.
//!
//! [`VolumeManager`] holds the registry state and implements every operation
//! on `&mut self`. The kernel uses one process-wide instance behind a
//! [`SpinLock`]: [`init`] creates it, and each free function in this module
//! (`mount`, `unmount`, `find_volume`, ...) runs its whole body under that
//! lock, so concurrent mounts and unmounts cannot interleave.
//!
//! # Ownership
//!
//! Registering a volume moves it into the registry, which keeps an
//! [`Arc<Volume>`]. Lookups hand out clones of that `Arc`. Unregistering or
//! unmounting gives the registry's `Arc` back to the caller, who decides when
//! the volume is dropped. The manager does not track open files, so a volume
//! can be unmounted while other handles to it are still alive; it only logs
//! a warning when that happens.

use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use keel_core::sync::SpinLock;
use keel_core::{kdebug, kerr, kfatal, kinfo, kwarn};

use crate::driver::{DriverError, DriverRegistry, FsDriver};
use crate::volume::{Volume, VolumeId};
use crate::{DirEntry, FsError, Node, namespace, path};

/// Mount names must be strictly shorter than this many bytes.
pub const MAX_NAME_LEN: usize = 255;

/// Name the boot scan mounts the system volume under.
pub const SYSTEM_VOLUME_NAME: &str = "system";

/// Prefix of the names given to volumes mounted without one.
pub const SYNTHETIC_NAME_PREFIX: &str = "volume";

/// Directory scanned for the system volume.
pub const DEV_PATH: &str = "/dev";

/// Errors returned by volume operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeError {
    /// The node to mount is not a character device.
    NotDevice,
    /// No registered driver recognises the device.
    InvalidFilesystem,
    /// The driver given for a mount does not recognise the device.
    DriverMismatch,
    /// The requested mount name is [`MAX_NAME_LEN`] bytes or longer.
    NameTooLong,
    /// The driver recognised the device but failed to mount it.
    MiscMountFailure,
    /// No registered volume matches.
    VolumeNotFound,
    /// The boot scan found no device to mount as the system volume.
    NoSystemVolume,
    /// The device directory does not exist.
    DeviceDirMissing,
}

impl VolumeError {
    /// Returns the negative status code reported across the kernel ABI.
    pub const fn code(self) -> i32 {
        match self {
            Self::NotDevice => -1,
            Self::InvalidFilesystem => -2,
            Self::MiscMountFailure => -3,
            Self::VolumeNotFound => -4,
            Self::DriverMismatch => -5,
            Self::NameTooLong => -6,
            Self::NoSystemVolume => -7,
            Self::DeviceDirMissing => -8,
        }
    }
}

impl fmt::Display for VolumeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotDevice => f.write_str("not a character device"),
            Self::InvalidFilesystem => f.write_str("no filesystem driver recognises the device"),
            Self::DriverMismatch => f.write_str("driver does not recognise the device"),
            Self::NameTooLong => f.write_str("volume name too long"),
            Self::MiscMountFailure => f.write_str("driver failed to mount the volume"),
            Self::VolumeNotFound => f.write_str("volume not found"),
            Self::NoSystemVolume => f.write_str("no system volume found"),
            Self::DeviceDirMissing => f.write_str("device directory not found"),
        }
    }
}

/// Registry of mounted volumes.
pub struct VolumeManager {
    /// Namespace root; registered mount points are linked under it.
    root: Arc<dyn Node>,
    /// Drivers consulted when a mount does not name one.
    drivers: DriverRegistry,
    /// Registered volumes in mount order.
    volumes: Vec<Arc<Volume>>,
    /// Set by the first successful boot scan, never cleared.
    system_volume: Option<Arc<Volume>>,
    next_volume_id: VolumeId,
    next_name_suffix: u64,
}

impl VolumeManager {
    /// Creates an empty registry over the namespace rooted at `root`.
    pub fn new(root: Arc<dyn Node>, drivers: DriverRegistry) -> Self {
        Self {
            root,
            drivers,
            volumes: Vec::new(),
            system_volume: None,
            next_volume_id: VolumeId::FIRST,
            next_name_suffix: 0,
        }
    }

    /// Returns the namespace root.
    pub fn root(&self) -> &Arc<dyn Node> {
        &self.root
    }

    /// Returns the driver registry.
    pub fn drivers(&self) -> &DriverRegistry {
        &self.drivers
    }

    /// Adds a driver for auto-detecting mounts.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::AlreadyRegistered`] if the name is taken.
    pub fn register_driver(&mut self, driver: Arc<dyn FsDriver>) -> Result<(), DriverError> {
        self.drivers.register(driver)
    }

    /// Returns the registered volumes in mount order.
    pub fn volumes(&self) -> &[Arc<Volume>] {
        &self.volumes
    }

    /// Returns the number of registered volumes.
    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    /// Returns `true` if no volumes are registered.
    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Returns the earliest-mounted registered volume called `name`.
    pub fn find_volume(&self, name: &str) -> Option<Arc<Volume>> {
        self.position_by_name(name).map(|i| Arc::clone(&self.volumes[i]))
    }

    /// Returns the registered volume with id `id`.
    pub fn find_volume_by_id(&self, id: VolumeId) -> Option<Arc<Volume>> {
        self.volumes.iter().find(|v| v.id() == Some(id)).cloned()
    }

    /// Returns the system volume, or `None` if the boot scan has not mounted one.
    pub fn system_volume(&self) -> Option<Arc<Volume>> {
        self.system_volume.clone()
    }

    /// Resolves an absolute `path` through the namespace and the mounted
    /// volumes.
    ///
    /// At the namespace root a component first matches the mount point of
    /// the earliest-mounted registered volume with that name, then the
    /// root's own children. Once a volume is unregistered its name no
    /// longer resolves here, although its mount point keeps its parent link.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::InvalidArgument`] for a relative path, or the first
    /// error from [`Node::lookup`] along the way.
    pub fn resolve(&self, path: &str) -> Result<Arc<dyn Node>, FsError> {
        if !path::is_absolute(path) {
            return Err(FsError::InvalidArgument);
        }

        let mut current = Arc::clone(&self.root);
        for component in path::components(path) {
            current = match component {
                "." => current,
                ".." => current.parent().unwrap_or(current),
                name => self.lookup_in(&current, name)?,
            };
        }
        Ok(current)
    }

    /// Registers `volume`: assigns its id, links its mount point under the
    /// namespace root and appends it to the registry.
    ///
    /// Taking the volume by value means a volume can be registered only once.
    pub fn register_volume(&mut self, volume: Volume) -> Arc<Volume> {
        let id = self.next_volume_id;
        self.next_volume_id = id.next();
        volume.assign_id(id);

        if let Some(mount_point) = volume.mount_point() {
            mount_point.set_parent(&self.root);
        }

        let volume = Arc::new(volume);
        self.volumes.push(Arc::clone(&volume));
        volume
    }

    /// Removes `volume` (matched by identity, not by name) from the registry
    /// and returns the registry's handle to it.
    ///
    /// The id is not reused and the mount point keeps its parent link.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::VolumeNotFound`] if `volume` is not registered
    /// here.
    pub fn unregister_volume(&mut self, volume: &Arc<Volume>) -> Result<Arc<Volume>, VolumeError> {
        let Some(index) = self.volumes.iter().position(|v| Arc::ptr_eq(v, volume)) else {
            kerr!("volume: cannot unregister '{}': not registered", volume.name());
            return Err(VolumeError::VolumeNotFound);
        };
        Ok(self.detach(index))
    }

    /// Mounts `device` with whichever registered driver recognises it.
    ///
    /// Without a `name` the volume gets the next synthetic `volumeN` name.
    ///
    /// # Errors
    ///
    /// [`VolumeError::NotDevice`] if `device` is not a character device,
    /// [`VolumeError::InvalidFilesystem`] if no driver recognises it, or any
    /// error from [`mount_with`](Self::mount_with).
    pub fn mount(
        &mut self,
        device: &Arc<dyn Node>,
        name: Option<&str>,
    ) -> Result<Arc<Volume>, VolumeError> {
        if !device.is_char_device() {
            kerr!("volume: cannot mount '{}': not a character device", device.name());
            return Err(VolumeError::NotDevice);
        }

        let Some(driver) = self.drivers.identify(&**device) else {
            kerr!("volume: cannot mount '{}': no filesystem driver recognises it", device.name());
            return Err(VolumeError::InvalidFilesystem);
        };

        self.mount_with(device, &driver, name)
    }

    /// Mounts `device` with `driver`.
    ///
    /// Without a `name` the volume gets the next synthetic `volumeN` name;
    /// the suffix is consumed even if the driver then fails.
    ///
    /// # Errors
    ///
    /// - [`VolumeError::NotDevice`] if `device` is not a character device.
    /// - [`VolumeError::DriverMismatch`] if `driver` does not recognise it.
    /// - [`VolumeError::NameTooLong`] if `name` is [`MAX_NAME_LEN`] bytes or longer.
    /// - [`VolumeError::MiscMountFailure`] if the driver fails, or returns a
    ///   volume under a different name.
    ///
    /// The registry is unchanged on every error.
    pub fn mount_with(
        &mut self,
        device: &Arc<dyn Node>,
        driver: &Arc<dyn FsDriver>,
        name: Option<&str>,
    ) -> Result<Arc<Volume>, VolumeError> {
        if !device.is_char_device() {
            kerr!("volume: cannot mount '{}': not a character device", device.name());
            return Err(VolumeError::NotDevice);
        }

        if !driver.identify(&**device) {
            kerr!(
                "volume: cannot mount '{}': driver '{}' does not recognise it",
                device.name(),
                driver.name()
            );
            return Err(VolumeError::DriverMismatch);
        }

        let name = match name {
            Some(name) if name.len() >= MAX_NAME_LEN => {
                kerr!(
                    "volume: cannot mount '{}': name is {} bytes, limit is {}",
                    device.name(),
                    name.len(),
                    MAX_NAME_LEN - 1
                );
                return Err(VolumeError::NameTooLong);
            }
            Some(name) => String::from(name),
            None => self.synthesize_name(),
        };

        let volume = match driver.mount(device, &name) {
            Ok(volume) => volume,
            Err(err) => {
                kerr!(
                    "volume: {} driver failed to mount '{}' as '{}': {}",
                    driver.name(),
                    device.name(),
                    name,
                    err
                );
                return Err(VolumeError::MiscMountFailure);
            }
        };

        if volume.name() != name {
            kerr!(
                "volume: {} driver mounted '{}' as '{}', expected '{}'",
                driver.name(),
                device.name(),
                volume.name(),
                name
            );
            return Err(VolumeError::MiscMountFailure);
        }

        let volume = self.register_volume(volume);
        kinfo!(
            "volume: mounted {} volume '{}' from '{}' (id {})",
            volume.fs_type(),
            volume.name(),
            device.name(),
            volume.id().map_or(0, VolumeId::as_u64)
        );
        Ok(volume)
    }

    /// Unmounts the earliest-mounted volume called `name` and returns the
    /// registry's handle to it.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::VolumeNotFound`] if no volume has that name.
    pub fn unmount(&mut self, name: &str) -> Result<Arc<Volume>, VolumeError> {
        let Some(index) = self.position_by_name(name) else {
            kerr!("volume: cannot unmount '{}': no such volume", name);
            return Err(VolumeError::VolumeNotFound);
        };

        let volume = self.detach(index);
        let held_here = 1 + usize::from(self.is_system_volume(&volume));
        let outstanding = Arc::strong_count(&volume).saturating_sub(held_here);
        if outstanding > 0 {
            kwarn!(
                "volume: '{}' unmounted with {} handle(s) still open",
                name,
                outstanding
            );
        }
        kinfo!("volume: unmounted '{}'", name);
        Ok(volume)
    }

    /// Mounts the system volume from the first usable device in `/dev`.
    ///
    /// Entries are visited by increasing index. Each one that is a character
    /// device recognised by a registered driver is mounted as `"system"`;
    /// the scan stops at the first success and later devices are not probed.
    /// If a system volume is already set it is returned without scanning.
    ///
    /// `/dev` should not change during the scan: entries are re-read by
    /// index (see [`namespace`]), so a concurrent insertion or removal can
    /// make the scan skip or revisit a device.
    ///
    /// # Errors
    ///
    /// [`VolumeError::DeviceDirMissing`] if `/dev` does not resolve, or
    /// [`VolumeError::NoSystemVolume`] if no device could be mounted.
    pub fn mount_system_volume(&mut self) -> Result<Arc<Volume>, VolumeError> {
        if let Some(system) = &self.system_volume {
            kwarn!("volume: system volume already mounted as '{}'", system.name());
            return Ok(Arc::clone(system));
        }

        let dev = match namespace::resolve_path(&self.root, DEV_PATH) {
            Ok(dev) => dev,
            Err(err) => {
                kfatal!("volume: cannot scan {} for the system volume: {}", DEV_PATH, err);
                return Err(VolumeError::DeviceDirMissing);
            }
        };

        for (index, entry) in namespace::entries(&*dev) {
            kdebug!("volume: boot scan {}[{}] = '{}'", DEV_PATH, index, entry.name);
            if let Some(volume) = self.try_mount_system_from(&dev, &entry) {
                kinfo!(
                    "volume: system volume mounted from {}/{}",
                    DEV_PATH,
                    entry.name
                );
                self.system_volume = Some(Arc::clone(&volume));
                return Ok(volume);
            }
        }

        kfatal!("volume: no device in {} holds a mountable filesystem", DEV_PATH);
        Err(VolumeError::NoSystemVolume)
    }

    /// Attempts to mount one `/dev` entry as the system volume.
    fn try_mount_system_from(
        &mut self,
        dev: &Arc<dyn Node>,
        entry: &DirEntry,
    ) -> Option<Arc<Volume>> {
        let device = namespace::find_dir(&**dev, &entry.name)?;
        if !device.is_char_device() {
            return None;
        }
        let driver = self.drivers.identify(&*device)?;
        self.mount_with(&device, &driver, Some(SYSTEM_VOLUME_NAME)).ok()
    }

    fn lookup_in(&self, dir: &Arc<dyn Node>, name: &str) -> Result<Arc<dyn Node>, FsError> {
        if Arc::ptr_eq(dir, &self.root) {
            let mounted = self
                .volumes
                .iter()
                .find(|v| v.name() == name)
                .and_then(|v| v.mount_point());
            if let Some(mount_point) = mounted {
                return Ok(Arc::clone(mount_point));
            }
        }
        dir.lookup(name)
    }

    fn position_by_name(&self, name: &str) -> Option<usize> {
        self.volumes.iter().position(|v| v.name() == name)
    }

    fn detach(&mut self, index: usize) -> Arc<Volume> {
        let volume = self.volumes.remove(index);
        volume.clear_id();
        volume
    }

    fn is_system_volume(&self, volume: &Arc<Volume>) -> bool {
        self.system_volume
            .as_ref()
            .is_some_and(|system| Arc::ptr_eq(system, volume))
    }

    fn synthesize_name(&mut self) -> String {
        let suffix = self.next_name_suffix;
        self.next_name_suffix += 1;
        format!("{SYNTHETIC_NAME_PREFIX}{suffix}")
    }
}

/// The kernel's volume manager.
static VOLUMES: SpinLock<Option<VolumeManager>> = SpinLock::named("VOLUMES", None);

/// Creates the kernel's volume manager.
///
/// Must run once, before any other function in this module.
///
/// # Panics
///
/// Panics if the volume manager has already been initialized.
pub fn init(root: Arc<dyn Node>, drivers: DriverRegistry) {
    let mut volumes = VOLUMES.lock();
    assert!(volumes.is_none(), "volume manager already initialized");
    *volumes = Some(VolumeManager::new(root, drivers));
}

/// Runs `f` with the volume manager locked for reading.
///
/// # Panics
///
/// Panics if the volume manager has not been initialized.
pub fn with_volumes<R>(f: impl FnOnce(&VolumeManager) -> R) -> R {
    let volumes = VOLUMES.lock();
    f(volumes.as_ref().expect("volume manager not initialized"))
}

/// Runs `f` with the volume manager locked for writing.
///
/// # Panics
///
/// Panics if the volume manager has not been initialized.
pub fn with_volumes_mut<R>(f: impl FnOnce(&mut VolumeManager) -> R) -> R {
    let mut volumes = VOLUMES.lock();
    f(volumes.as_mut().expect("volume manager not initialized"))
}

/// See [`VolumeManager::register_driver`].
///
/// # Errors
///
/// Returns [`DriverError::AlreadyRegistered`] if the name is taken.
pub fn register_driver(driver: Arc<dyn FsDriver>) -> Result<(), DriverError> {
    with_volumes_mut(|vm| vm.register_driver(driver))
}

/// See [`VolumeManager::mount_system_volume`].
///
/// # Errors
///
/// As for [`VolumeManager::mount_system_volume`].
pub fn mount_system_volume() -> Result<Arc<Volume>, VolumeError> {
    with_volumes_mut(VolumeManager::mount_system_volume)
}

/// See [`VolumeManager::mount`].
///
/// # Errors
///
/// As for [`VolumeManager::mount`].
pub fn mount(device: &Arc<dyn Node>, name: Option<&str>) -> Result<Arc<Volume>, VolumeError> {
    with_volumes_mut(|vm| vm.mount(device, name))
}

/// See [`VolumeManager::mount_with`].
///
/// # Errors
///
/// As for [`VolumeManager::mount_with`].
pub fn mount_with(
    device: &Arc<dyn Node>,
    driver: &Arc<dyn FsDriver>,
    name: Option<&str>,
) -> Result<Arc<Volume>, VolumeError> {
    with_volumes_mut(|vm| vm.mount_with(device, driver, name))
}

/// See [`VolumeManager::unmount`].
///
/// # Errors
///
/// Returns [`VolumeError::VolumeNotFound`] if no volume has that name.
pub fn unmount(name: &str) -> Result<Arc<Volume>, VolumeError> {
    with_volumes_mut(|vm| vm.unmount(name))
}

/// See [`VolumeManager::register_volume`].
pub fn register_volume(volume: Volume) -> Arc<Volume> {
    with_volumes_mut(|vm| vm.register_volume(volume))
}

/// See [`VolumeManager::unregister_volume`].
///
/// # Errors
///
/// Returns [`VolumeError::VolumeNotFound`] if `volume` is not registered.
pub fn unregister_volume(volume: &Arc<Volume>) -> Result<Arc<Volume>, VolumeError> {
    with_volumes_mut(|vm| vm.unregister_volume(volume))
}

/// See [`VolumeManager::find_volume`].
pub fn find_volume(name: &str) -> Option<Arc<Volume>> {
    with_volumes(|vm| vm.find_volume(name))
}

/// See [`VolumeManager::resolve`].
///
/// # Errors
///
/// As for [`VolumeManager::resolve`].
pub fn resolve(path: &str) -> Result<Arc<dyn Node>, FsError> {
    with_volumes(|vm| vm.resolve(path))
}

/// See [`VolumeManager::system_volume`].
pub fn system_volume() -> Option<Arc<Volume>> {
    with_volumes(VolumeManager::system_volume)
}

/// Returns a snapshot of the registered volumes in mount order.
pub fn volumes() -> Vec<Arc<Volume>> {
    with_volumes(|vm| vm.volumes().to_vec())
}
