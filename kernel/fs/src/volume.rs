//! Mounted volumes and their identifiers.

use alloc::string::String;
use alloc::sync::Arc;
use core::fmt;
use core::num::NonZeroU64;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::Node;

/// Identifier the volume manager assigns to a volume when it registers it.
///
/// Identifiers start at 1 and increase with every registration. They are
/// not stable across reboots. The counter saturates: once `u64::MAX` has
/// been handed out every later registration gets `u64::MAX` too, so ids are
/// unique only for the first `u64::MAX` registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct VolumeId(NonZeroU64);

impl VolumeId {
    /// The first identifier handed out.
    pub const FIRST: Self = Self(NonZeroU64::MIN);

    /// Creates a `VolumeId` from its raw value; `0` is not a valid id.
    pub const fn new(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    /// Returns the raw `u64` value.
    pub const fn as_u64(self) -> u64 {
        self.0.get()
    }

    /// Returns the identifier after this one, or `self` at `u64::MAX`.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A mounted filesystem instance.
///
/// Drivers build volumes in [`FsDriver::mount`](crate::driver::FsDriver::mount);
/// the volume manager takes ownership when it registers them. A volume's
/// name is the name of its mount-point node, so the two always agree.
pub struct Volume {
    fs_type: &'static str,
    name: String,
    /// Raw [`VolumeId`], `0` while unregistered.
    id: AtomicU64,
    mount_point: Option<Arc<dyn Node>>,
}

impl Volume {
    /// Creates a volume rooted at `mount_point`, named after it.
    pub fn new(fs_type: &'static str, mount_point: Arc<dyn Node>) -> Self {
        Self {
            fs_type,
            name: String::from(mount_point.name()),
            id: AtomicU64::new(0),
            mount_point: Some(mount_point),
        }
    }

    /// Creates a volume with no mount-point node.
    pub fn detached(fs_type: &'static str, name: impl Into<String>) -> Self {
        Self {
            fs_type,
            name: name.into(),
            id: AtomicU64::new(0),
            mount_point: None,
        }
    }

    /// Returns the filesystem type of the driver that mounted the volume.
    pub fn fs_type(&self) -> &'static str {
        self.fs_type
    }

    /// Returns the volume's mount name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the volume's id, or `None` unless the volume is currently
    /// registered.
    pub fn id(&self) -> Option<VolumeId> {
        VolumeId::new(self.id.load(Ordering::Acquire))
    }

    /// Returns `true` while the volume is registered with a volume manager.
    pub fn is_registered(&self) -> bool {
        self.id().is_some()
    }

    /// Returns the root node of the mounted filesystem.
    pub fn mount_point(&self) -> Option<&Arc<dyn Node>> {
        self.mount_point.as_ref()
    }

    pub(crate) fn assign_id(&self, id: VolumeId) {
        self.id.store(id.as_u64(), Ordering::Release);
    }

    pub(crate) fn clear_id(&self) {
        self.id.store(0, Ordering::Release);
    }
}

impl fmt::Debug for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Volume")
            .field("fs_type", &self.fs_type)
            .field("name", &self.name)
            .field("id", &self.id())
            .field("mount_point", &self.mount_point.as_ref().map(|n| n.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ramfs::RamDir;

    #[test]
    fn volume_id_rejects_zero() {
        assert!(VolumeId::new(0).is_none());
        assert_eq!(VolumeId::new(7).unwrap().as_u64(), 7);
        assert_eq!(VolumeId::FIRST.as_u64(), 1);
        assert_eq!(VolumeId::FIRST.next().as_u64(), 2);
        assert_eq!(format!("{}", VolumeId::FIRST), "1");
    }

    #[test]
    fn volume_id_saturates_at_max() {
        let last = VolumeId::new(u64::MAX).unwrap();
        assert_eq!(last.next(), last);
        assert_eq!(VolumeId::new(u64::MAX - 1).unwrap().next(), last);
    }

    #[test]
    fn name_follows_mount_point() {
        let volume = Volume::new("kfs", RamDir::new("data"));
        assert_eq!(volume.name(), "data");
        assert_eq!(volume.fs_type(), "kfs");
        assert_eq!(volume.mount_point().unwrap().name(), "data");
    }

    #[test]
    fn unregistered_volume_has_no_id() {
        let volume = Volume::detached("kfs", "scratch");
        assert_eq!(volume.id(), None);
        assert!(!volume.is_registered());
        assert!(volume.mount_point().is_none());

        volume.assign_id(VolumeId::FIRST);
        assert_eq!(volume.id(), Some(VolumeId::FIRST));
        volume.clear_id();
        assert!(!volume.is_registered());
    }

    #[test]
    fn debug_shows_identity() {
        let volume = Volume::detached("kfs", "scratch");
        let text = format!("{volume:?}");
        assert!(text.contains("scratch"));
        assert!(text.contains("kfs"));
    }
}
