//! In-memory directory nodes.
//!
//! [`RamDir`] is the building block for the namespace root and for the
//! mount-point roots that drivers hand back from
//! [`FsDriver::mount`](crate::driver::FsDriver::mount).

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;

use keel_core::sync::SpinLock;

use crate::{DirEntry, FsError, Node, NodeType, ParentLink};

/// A heap-backed directory.
///
/// Children are kept sorted by name, which fixes the order `read_dir`
/// enumerates them in.
pub struct RamDir {
    name: String,
    parent: ParentLink,
    children: SpinLock<BTreeMap<String, Arc<dyn Node>>>,
}

impl RamDir {
    /// Creates an empty, unlinked directory.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            parent: ParentLink::new(),
            children: SpinLock::named("RamDir::children", BTreeMap::new()),
        })
    }

    /// Inserts `child` under its own name and links its parent to `self`.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::AlreadyExists`] if a child with that name exists.
    pub fn add_child(self: &Arc<Self>, child: Arc<dyn Node>) -> Result<(), FsError> {
        {
            let mut children = self.children.lock();
            if children.contains_key(child.name()) {
                return Err(FsError::AlreadyExists);
            }
            children.insert(child.name().to_string(), Arc::clone(&child));
        }
        let this: Arc<dyn Node> = self.clone();
        child.set_parent(&this);
        Ok(())
    }

    /// Removes and returns the child named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::NotFound`] if there is no such child.
    pub fn remove_child(&self, name: &str) -> Result<Arc<dyn Node>, FsError> {
        self.children.lock().remove(name).ok_or(FsError::NotFound)
    }

    /// Returns the number of children.
    pub fn len(&self) -> usize {
        self.children.lock().len()
    }

    /// Returns `true` if the directory has no children.
    pub fn is_empty(&self) -> bool {
        self.children.lock().is_empty()
    }
}

impl Node for RamDir {
    fn name(&self) -> &str {
        &self.name
    }

    fn node_type(&self) -> NodeType {
        NodeType::Directory
    }

    fn read(&self, _offset: usize, _buf: &mut [u8]) -> Result<usize, FsError> {
        Err(FsError::IsADirectory)
    }

    fn read_dir(&self, index: usize) -> Result<Option<DirEntry>, FsError> {
        Ok(self
            .children
            .lock()
            .iter()
            .nth(index)
            .map(|(name, node)| DirEntry {
                name: name.clone(),
                node_type: node.node_type(),
            }))
    }

    fn lookup(&self, name: &str) -> Result<Arc<dyn Node>, FsError> {
        self.children.lock().get(name).cloned().ok_or(FsError::NotFound)
    }

    fn parent(&self) -> Option<Arc<dyn Node>> {
        self.parent.get()
    }

    fn set_parent(&self, parent: &Arc<dyn Node>) {
        self.parent.set(parent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_lookup_child() {
        let root = RamDir::new("/");
        root.add_child(RamDir::new("dev")).unwrap();

        let dev = root.lookup("dev").unwrap();
        assert_eq!(dev.name(), "dev");
        assert_eq!(dev.node_type(), NodeType::Directory);
        assert_eq!(dev.parent().unwrap().name(), "/");
    }

    #[test]
    fn duplicate_child_rejected() {
        let root = RamDir::new("/");
        root.add_child(RamDir::new("mnt")).unwrap();
        assert_eq!(root.add_child(RamDir::new("mnt")), Err(FsError::AlreadyExists));
        assert_eq!(root.len(), 1);
    }

    #[test]
    fn read_dir_enumerates_in_name_order() {
        let root = RamDir::new("/");
        for name in ["c", "a", "b"] {
            root.add_child(RamDir::new(name)).unwrap();
        }

        let names: Vec<_> = (0..)
            .map_while(|i| root.read_dir(i).unwrap())
            .map(|entry| entry.name)
            .collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(root.read_dir(3), Ok(None));
    }

    #[test]
    fn remove_child() {
        let root = RamDir::new("/");
        root.add_child(RamDir::new("tmp")).unwrap();
        assert_eq!(root.remove_child("tmp").unwrap().name(), "tmp");
        assert!(root.is_empty());
        assert!(matches!(root.remove_child("tmp"), Err(FsError::NotFound)));
        assert!(matches!(root.lookup("tmp"), Err(FsError::NotFound)));
    }

    #[test]
    fn directory_has_no_data() {
        let root = RamDir::new("/");
        let mut buf = [0u8; 4];
        assert_eq!(root.read(0, &mut buf), Err(FsError::IsADirectory));
    }
}
