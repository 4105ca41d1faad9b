use std::collections::btree_map::{self, BTreeMap};

use crate::FileRecord;

/// Server-assigned ordinal of a row's form fields (`form-N-status`).
pub type FormSlot = usize;

/// Two rows of the same page claimed one form slot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("form slot {slot} claimed by files {existing_id} and {rejected_id}")]
pub struct DuplicateSlot {
    pub slot: FormSlot,
    pub existing_id: u64,
    pub rejected_id: u64,
}

/// Records of one listing page keyed by form slot.
///
/// Slots are unique within a page only; every page resubmits its own
/// numbering. Iteration is in slot order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRecords {
    records: BTreeMap<FormSlot, FileRecord>,
}

impl PageRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: FileRecord) -> Result<(), DuplicateSlot> {
        match self.records.entry(record.form_slot) {
            btree_map::Entry::Occupied(existing) => Err(DuplicateSlot {
                slot: record.form_slot,
                existing_id: existing.get().id,
                rejected_id: record.id,
            }),
            btree_map::Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, slot: FormSlot) -> Option<&FileRecord> {
        self.records.get(&slot)
    }

    pub fn get_mut(&mut self, slot: FormSlot) -> Option<&mut FileRecord> {
        self.records.get_mut(&slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut FileRecord> {
        self.records.values_mut()
    }
}
