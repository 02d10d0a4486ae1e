//! Path resolution and directory enumeration over [`Node`]s.
//!
//! These are the primitives the volume manager uses to find `/dev` and walk
//! its entries at boot.
//!
//! Enumeration is stateless: every step asks the directory for the entry at
//! an explicit index. [`DirEntries`] wraps that as an iterator but keeps only
//! the next index, so it can be restarted or resumed at any position. The
//! cost is that a directory modified between two steps may shift entries
//! under the index: an entry can be skipped or seen twice, and callers that
//! need a consistent view must keep the directory from changing while they
//! iterate.

use alloc::sync::Arc;

use crate::path;
use crate::{DirEntry, FsError, Node};

/// Resolves an absolute `path` starting at `root`.
///
/// `.` stays in place and `..` moves to the parent (the root is its own
/// parent).
///
/// # Errors
///
/// Returns [`FsError::InvalidArgument`] for a relative path, or the first
/// error from [`Node::lookup`] along the way.
pub fn resolve_path(root: &Arc<dyn Node>, path: &str) -> Result<Arc<dyn Node>, FsError> {
    if !path::is_absolute(path) {
        return Err(FsError::InvalidArgument);
    }

    let mut current = Arc::clone(root);
    for component in path::components(path) {
        current = match component {
            "." => current,
            ".." => current.parent().unwrap_or(current),
            name => current.lookup(name)?,
        };
    }
    Ok(current)
}

/// Looks up `name` directly inside `dir`.
pub fn find_dir(dir: &dyn Node, name: &str) -> Option<Arc<dyn Node>> {
    dir.lookup(name).ok()
}

/// Returns the entry of `dir` at `index`, or `None` once exhausted or if
/// `dir` cannot be enumerated.
pub fn read_dir(dir: &dyn Node, index: usize) -> Option<DirEntry> {
    dir.read_dir(index).ok().flatten()
}

/// Returns an iterator over the entries of `dir`, starting at index 0.
pub fn entries(dir: &dyn Node) -> DirEntries<'_> {
    DirEntries { dir, next: 0 }
}

/// Index-driven iterator over a directory's entries.
///
/// Yields `(index, entry)` pairs and ends at the first index with no entry.
pub struct DirEntries<'a> {
    dir: &'a dyn Node,
    next: usize,
}

impl DirEntries<'_> {
    /// Returns the index the next call to `next` will read.
    pub fn position(&self) -> usize {
        self.next
    }

    /// Moves the iterator so the next read happens at `index`.
    pub fn seek(&mut self, index: usize) {
        self.next = index;
    }

    /// Moves the iterator back to the first entry.
    pub fn restart(&mut self) {
        self.seek(0);
    }
}

impl Iterator for DirEntries<'_> {
    type Item = (usize, DirEntry);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next;
        let entry = read_dir(self.dir, index)?;
        self.next = index + 1;
        Some((index, entry))
    }
}
