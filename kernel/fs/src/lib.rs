//! Filesystem namespace and volume management for the Keel kernel.
//!
//! The crate has two layers:
//!
//! - the **node layer**: the [`Node`] trait, the in-memory directory
//!   ([`ramfs::RamDir`]), `/dev` ([`devfs::DevFs`]) and path walking
//!   ([`namespace`], [`path`]);
//! - the **volume layer**: filesystem drivers ([`driver::FsDriver`]) and the
//!   registry that identifies them ([`driver::DriverRegistry`]), mounted
//!   [`volume::Volume`]s, and the [`manager`] that mounts, tracks and
//!   unmounts them and brings up the system volume at boot.
//!
//! Everything here is hardware-independent, so it builds `no_std` for the
//! kernel and runs under `cargo test` on the host.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

extern crate alloc;

pub mod devfs;
pub mod driver;
pub mod manager;
pub mod namespace;
pub mod path;
pub mod ramfs;
pub mod volume;

use alloc::string::String;
use alloc::sync::{Arc, Weak};
use core::fmt;

use keel_core::sync::SpinLock;

pub use driver::{DriverError, DriverRegistry, FsDriver};
pub use manager::{VolumeError, VolumeManager};
pub use volume::{Volume, VolumeId};

/// Errors returned by node and namespace operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// No entry with the requested name exists.
    NotFound,
    /// A directory operation was attempted on a non-directory.
    NotADirectory,
    /// A data operation was attempted on a directory.
    IsADirectory,
    /// The node does not support the operation.
    NotSupported,
    /// Malformed argument, e.g. a relative path where an absolute one is required.
    InvalidArgument,
    /// An entry with the same name already exists.
    AlreadyExists,
    /// The backing device failed.
    IoError,
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("no such file or directory"),
            Self::NotADirectory => f.write_str("not a directory"),
            Self::IsADirectory => f.write_str("is a directory"),
            Self::NotSupported => f.write_str("operation not supported"),
            Self::InvalidArgument => f.write_str("invalid argument"),
            Self::AlreadyExists => f.write_str("entry already exists"),
            Self::IoError => f.write_str("I/O error"),
        }
    }
}

/// Kind of a namespace node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// A directory.
    Directory,
    /// A byte-stream device; the only kind a volume can be mounted from.
    CharDevice,
    /// A regular file.
    File,
}

/// One entry produced by [`Node::read_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name within its directory.
    pub name: String,
    /// Kind of the node the entry names.
    pub node_type: NodeType,
}

/// A node in the filesystem namespace.
///
/// Directory enumeration is index-based: `read_dir(i)` returns the `i`-th
/// entry or `None` past the end, with no cursor kept between calls.
pub trait Node: Send + Sync {
    /// Returns the node's name within its parent directory.
    fn name(&self) -> &str;

    /// Returns the node's kind.
    fn node_type(&self) -> NodeType;

    /// Returns `true` if the node is a character device.
    fn is_char_device(&self) -> bool {
        self.node_type() == NodeType::CharDevice
    }

    /// Reads up to `buf.len()` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Directories return [`FsError::IsADirectory`]; nodes without data
    /// return [`FsError::NotSupported`].
    fn read(&self, _offset: usize, _buf: &mut [u8]) -> Result<usize, FsError> {
        Err(FsError::NotSupported)
    }

    /// Returns the entry at `index`, or `None` once enumeration is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::NotADirectory`] for non-directories.
    fn read_dir(&self, _index: usize) -> Result<Option<DirEntry>, FsError> {
        Err(FsError::NotADirectory)
    }

    /// Looks up a direct child by name.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::NotFound`] if no child has that name, or
    /// [`FsError::NotADirectory`] for non-directories.
    fn lookup(&self, _name: &str) -> Result<Arc<dyn Node>, FsError> {
        Err(FsError::NotADirectory)
    }

    /// Returns the parent node, if linked and still alive.
    fn parent(&self) -> Option<Arc<dyn Node>>;

    /// Links this node under `parent`.
    fn set_parent(&self, parent: &Arc<dyn Node>);
}

/// Weak back-link from a node to its parent.
///
/// Weak so that a parent holding its children does not form a cycle.
#[derive(Default)]
pub struct ParentLink(SpinLock<Option<Weak<dyn Node>>>);

impl ParentLink {
    /// Creates an unlinked parent slot.
    #[must_use]
    pub fn new() -> Self {
        Self(SpinLock::new(None))
    }

    /// Returns the parent if one is linked and still alive.
    pub fn get(&self) -> Option<Arc<dyn Node>> {
        self.0.lock().as_ref().and_then(Weak::upgrade)
    }

    /// Replaces the parent link.
    pub fn set(&self, parent: &Arc<dyn Node>) {
        *self.0.lock() = Some(Arc::downgrade(parent));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ramfs::RamDir;

    #[test]
    fn fs_error_display() {
        assert_eq!(format!("{}", FsError::NotFound), "no such file or directory");
        assert_eq!(format!("{}", FsError::IoError), "I/O error");
    }

    #[test]
    fn parent_link_starts_empty() {
        let link = ParentLink::new();
        assert!(link.get().is_none());
    }

    #[test]
    fn parent_link_does_not_keep_parent_alive() {
        let link = ParentLink::new();
        {
            let parent: Arc<dyn Node> = RamDir::new("tmp");
            link.set(&parent);
            assert_eq!(link.get().map(|p| String::from(p.name())), Some(String::from("tmp")));
        }
        assert!(link.get().is_none());
    }
}
