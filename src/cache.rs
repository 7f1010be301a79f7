//! Memoized property table for one root directory.
//!
//! A [`CacheHandle`] is owned by the caller and threaded through every engine
//! call. It holds at most one [`ClassificationCache`], valid only for the root
//! it was built from. Keyframe data, once present, is never dropped.

use crate::file_organizer::{OrganizeError, OrganizeResult};
use crate::probe::MediaProbe;
use crate::table::PropertyTable;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Property table plus the root it describes.
#[derive(Debug, Clone)]
pub struct ClassificationCache {
    root: PathBuf,
    includes_keyframe_data: bool,
    table: PropertyTable,
}

impl ClassificationCache {
    /// Analyzes `root` without keyframe data.
    pub fn build<P>(root: &Path, probe: &P) -> OrganizeResult<Self>
    where
        P: MediaProbe + ?Sized,
    {
        let table = PropertyTable::build(root, false, probe)?;
        info!(root = %root.display(), files = table.len(), "cache built");
        Ok(Self {
            root: root.to_path_buf(),
            includes_keyframe_data: false,
            table,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn includes_keyframe_data(&self) -> bool {
        self.includes_keyframe_data
    }

    pub fn table(&self) -> &PropertyTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut PropertyTable {
        &mut self.table
    }

    /// Turns keyframe data on. Turning it off is a no-op.
    ///
    /// Only the first request probes; returns whether probing happened.
    pub fn request_keyframes<P>(&mut self, include: bool, probe: &P) -> bool
    where
        P: MediaProbe + ?Sized,
    {
        if !include || self.includes_keyframe_data {
            return false;
        }
        let filled = self.table.augment_keyframes(&self.root, probe);
        debug!(filled, "keyframe intervals added");
        self.includes_keyframe_data = true;
        true
    }

    /// Adds records for files in the root that the table doesn't know yet.
    ///
    /// Returns the number of records added.
    pub fn admit<P>(&mut self, filenames: &[String], probe: &P) -> usize
    where
        P: MediaProbe + ?Sized,
    {
        let fresh: Vec<String> = filenames
            .iter()
            .filter(|name| !self.table.contains(name))
            .cloned()
            .collect();
        if fresh.is_empty() {
            return 0;
        }

        let records =
            PropertyTable::analyze_files(&self.root, &fresh, self.includes_keyframe_data, probe);
        let added = records.len();
        for record in records {
            self.table.push(record);
        }
        debug!(added, "records admitted");
        added
    }
}

/// Caller-owned slot for the current cache.
#[derive(Debug, Default)]
pub struct CacheHandle {
    slot: Option<ClassificationCache>,
}

impl CacheHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cache for `root`, building it if the slot is empty or holds
    /// another root.
    ///
    /// # Errors
    ///
    /// Propagates an invalid root. The slot is left empty in that case.
    pub fn get<P>(&mut self, root: &Path, probe: &P) -> OrganizeResult<&mut ClassificationCache>
    where
        P: MediaProbe + ?Sized,
    {
        if self.slot.as_ref().is_none_or(|c| c.root != root) {
            self.slot = None;
            let fresh = ClassificationCache::build(root, probe)?;
            return Ok(self.slot.insert(fresh));
        }

        self.slot.as_mut().ok_or_else(|| OrganizeError::InvalidRoot {
            path: root.to_path_buf(),
            reason: "cache slot is empty".to_string(),
        })
    }

    /// The cache for `root`, if one is loaded.
    pub fn peek(&self, root: &Path) -> Option<&ClassificationCache> {
        self.slot.as_ref().filter(|c| c.root == root)
    }

    pub fn peek_mut(&mut self, root: &Path) -> Option<&mut ClassificationCache> {
        self.slot.as_mut().filter(|c| c.root == root)
    }

    pub fn is_loaded_for(&self, root: &Path) -> bool {
        self.peek(root).is_some()
    }

    pub fn invalidate(&mut self) {
        self.slot = None;
    }
}
