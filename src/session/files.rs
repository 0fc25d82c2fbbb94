//! Local mirror of the logged-in user's file list

use crate::remote::{FileId, FileSummary};

/// Files owned by the current user, in server order.
///
/// Titles never change after creation, so the cache only ever inserts,
/// removes, or is replaced wholesale from a fresh listing.
#[derive(Debug, Clone, Default)]
pub struct FileListCache {
    entries: Vec<FileSummary>,
}

impl FileListCache {
    /// Replace the contents with a fresh listing
    pub fn replace(&mut self, entries: Vec<FileSummary>) {
        self.entries = entries;
    }

    /// Append a newly created file (ignored if the id is already listed)
    pub fn insert(&mut self, summary: FileSummary) {
        if self.get(&summary.id).is_none() {
            self.entries.push(summary);
        }
    }

    pub fn remove(&mut self, id: &FileId) -> Option<FileSummary> {
        let idx = self.position(id)?;
        Some(self.entries.remove(idx))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, id: &FileId) -> Option<&FileSummary> {
        self.entries.iter().find(|f| &f.id == id)
    }

    pub fn position(&self, id: &FileId) -> Option<usize> {
        self.entries.iter().position(|f| &f.id == id)
    }

    /// Case-insensitive title lookup
    pub fn contains_title(&self, title: &str) -> bool {
        let wanted = title.to_lowercase();
        self.entries.iter().any(|f| f.title.to_lowercase() == wanted)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileSummary> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
