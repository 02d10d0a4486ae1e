//! Device directory (`/dev`).
//!
//! Always provides:
//! - `/dev/null` -- reads return 0 bytes
//! - `/dev/zero` -- reads fill the buffer with zeros
//!
//! Further character devices are added with [`DevFs::with_extra_devices`] or
//! [`DevFs::register`]. [`RamDevice`] exposes an in-memory byte image as a
//! character device, which is how filesystem images reach the volume layer
//! when no disk driver is present.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::ramfs::RamDir;
use crate::{FsError, Node, NodeType, ParentLink};

/// The `/dev` directory.
pub struct DevFs {
    root: Arc<RamDir>,
}

impl Default for DevFs {
    fn default() -> Self {
        Self::new()
    }
}

impl DevFs {
    /// Creates `/dev` with the standard `null` and `zero` devices.
    ///
    /// # Panics
    ///
    /// Never in practice: the fresh directory holds no names to collide with.
    #[must_use]
    pub fn new() -> Self {
        let root = RamDir::new("dev");
        root.add_child(Arc::new(DevNull::new())).expect("fresh /dev");
        root.add_child(Arc::new(DevZero::new())).expect("fresh /dev");
        Self { root }
    }

    /// Creates `/dev` with the standard devices plus `devices`.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::AlreadyExists`] if two devices share a name or a
    /// device is called `null` or `zero`.
    pub fn with_extra_devices(
        devices: impl IntoIterator<Item = Arc<dyn Node>>,
    ) -> Result<Self, FsError> {
        let devfs = Self::new();
        for device in devices {
            devfs.register(device)?;
        }
        Ok(devfs)
    }

    /// Adds a device node.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::AlreadyExists`] if the name is taken.
    pub fn register(&self, device: Arc<dyn Node>) -> Result<(), FsError> {
        self.root.add_child(device)
    }

    /// Removes the device named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::NotFound`] if there is no such device.
    pub fn unregister(&self, name: &str) -> Result<Arc<dyn Node>, FsError> {
        self.root.remove_child(name)
    }

    /// Returns the `/dev` directory node, ready to be linked into a namespace.
    #[must_use]
    pub fn root(&self) -> Arc<dyn Node> {
        self.root.clone()
    }
}

// ── /dev/null ──────────────────────────────────────────────────────────

/// `/dev/null` -- reads return end-of-file.
#[derive(Default)]
pub struct DevNull {
    parent: ParentLink,
}

impl DevNull {
    /// Creates an unlinked `null` device.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Node for DevNull {
    fn name(&self) -> &str {
        "null"
    }

    fn node_type(&self) -> NodeType {
        NodeType::CharDevice
    }

    fn read(&self, _offset: usize, _buf: &mut [u8]) -> Result<usize, FsError> {
        Ok(0)
    }

    fn parent(&self) -> Option<Arc<dyn Node>> {
        self.parent.get()
    }

    fn set_parent(&self, parent: &Arc<dyn Node>) {
        self.parent.set(parent);
    }
}

// ── /dev/zero ──────────────────────────────────────────────────────────

/// `/dev/zero` -- reads fill the buffer with zeros.
#[derive(Default)]
pub struct DevZero {
    parent: ParentLink,
}

impl DevZero {
    /// Creates an unlinked `zero` device.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Node for DevZero {
    fn name(&self) -> &str {
        "zero"
    }

    fn node_type(&self) -> NodeType {
        NodeType::CharDevice
    }

    fn read(&self, _offset: usize, buf: &mut [u8]) -> Result<usize, FsError> {
        buf.fill(0);
        Ok(buf.len())
    }

    fn parent(&self) -> Option<Arc<dyn Node>> {
        self.parent.get()
    }

    fn set_parent(&self, parent: &Arc<dyn Node>) {
        self.parent.set(parent);
    }
}

// ── image-backed devices ───────────────────────────────────────────────

/// A read-only character device backed by an in-memory image.
pub struct RamDevice {
    name: String,
    image: Vec<u8>,
    parent: ParentLink,
}

impl RamDevice {
    /// Creates a device called `name` whose contents are `image`.
    #[must_use]
    pub fn new(name: impl Into<String>, image: impl Into<Vec<u8>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            image: image.into(),
            parent: ParentLink::new(),
        })
    }

    /// Returns the size of the backing image in bytes.
    pub fn len(&self) -> usize {
        self.image.len()
    }

    /// Returns `true` if the backing image is empty.
    pub fn is_empty(&self) -> bool {
        self.image.is_empty()
    }
}

impl Node for RamDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn node_type(&self) -> NodeType {
        NodeType::CharDevice
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<usize, FsError> {
        let Some(tail) = self.image.get(offset..) else {
            return Ok(0);
        };
        let n = tail.len().min(buf.len());
        buf[..n].copy_from_slice(&tail[..n]);
        Ok(n)
    }

    fn parent(&self) -> Option<Arc<dyn Node>> {
        self.parent.get()
    }

    fn set_parent(&self, parent: &Arc<dyn Node>) {
        self.parent.set(parent);
    }
}
