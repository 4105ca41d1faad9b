use serde::{Deserialize, Serialize};

use crate::{FileStatus, FormSlot};

/// Version block a file belongs to. Shared by every file of the version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub id: u64,
    pub name: String,
    pub channel: String,
}

/// One uploaded file of an add-on, as rendered in a listing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: u64,
    pub name: String,
    /// Kept as rendered; the markup gives no unambiguous date format.
    pub date: String,
    pub version: VersionInfo,
    pub platforms: String,
    pub status: FileStatus,
    pub hash: String,
    pub form_slot: FormSlot,
}

impl FileRecord {
    pub fn is_deleted(&self) -> bool {
        self.status.is_terminal()
    }
}
