use std::collections::HashSet;

use crate::{FileRecord, FileStatus, PageRecords};

/// Reconciled state of one add-on listing after a successful load.
///
/// `status` and `token` come from page 1 and are echoed on every page's
/// commit. The token is only refreshed by a full reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingState {
    pub slug: String,
    pub status: String,
    pub token: String,
    pages: Vec<PageRecords>,
}

impl ListingState {
    /// `pages` must hold at least page 1, in page order.
    pub fn new(slug: String, status: String, token: String, pages: Vec<PageRecords>) -> Self {
        Self {
            slug,
            status,
            token,
            pages,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[PageRecords] {
        &self.pages
    }

    pub fn pages_mut(&mut self) -> &mut [PageRecords] {
        &mut self.pages
    }

    /// Flattened view over every page, rebuilt on each call.
    pub fn files(&self) -> impl Iterator<Item = &FileRecord> {
        self.pages.iter().flat_map(PageRecords::iter)
    }

    pub fn files_mut(&mut self) -> impl Iterator<Item = &mut FileRecord> {
        self.pages.iter_mut().flat_map(PageRecords::iter_mut)
    }

    pub fn file_count(&self) -> usize {
        self.pages.iter().map(PageRecords::len).sum()
    }

    /// Approves every file. Deleted files are approved too.
    pub fn enable_all_files(&mut self) -> usize {
        self.set_status_where(FileStatus::Approved, |_| true)
    }

    /// Disables every file except deleted ones, which stay terminal.
    pub fn disable_all_files(&mut self) -> usize {
        self.set_status_where(FileStatus::Disabled, |file| !file.is_deleted())
    }

    /// Approves the non-deleted files of the named versions.
    pub fn enable_versions<S: AsRef<str>>(&mut self, names: &[S]) -> usize {
        let wanted = name_set(names);
        self.set_status_where(FileStatus::Approved, |file| {
            wanted.contains(file.version.name.as_str()) && !file.is_deleted()
        })
    }

    /// Disables every file of the named versions, deleted ones included.
    pub fn disable_versions<S: AsRef<str>>(&mut self, names: &[S]) -> usize {
        let wanted = name_set(names);
        self.set_status_where(FileStatus::Disabled, |file| {
            wanted.contains(file.version.name.as_str())
        })
    }

    /// Sets `status` on every file matching `filter`, returning how many matched.
    pub fn set_status_where<F>(&mut self, status: FileStatus, mut filter: F) -> usize
    where
        F: FnMut(&FileRecord) -> bool,
    {
        let mut touched = 0;
        for file in self.files_mut() {
            if filter(file) {
                file.status = status;
                touched += 1;
            }
        }
        touched
    }
}

fn name_set<S: AsRef<str>>(names: &[S]) -> HashSet<&str> {
    names.iter().map(AsRef::as_ref).collect()
}
