use amo_core::{FileRecord, FileStatus, ListingState, PageRecords, VersionInfo};
use pretty_assertions::assert_eq;

fn record(id: u64, slot: usize, version: &str, status: FileStatus) -> FileRecord {
    FileRecord {
        id,
        name: format!("addon-{version}-{id}.xpi"),
        date: "Jan. 1, 2024".to_string(),
        version: VersionInfo {
            id: id * 10,
            name: version.to_string(),
            channel: "Listed".to_string(),
        },
        platforms: "All Platforms".to_string(),
        status,
        hash: format!("sha256:{id:04x}"),
        form_slot: slot,
    }
}

fn page(records: Vec<FileRecord>) -> PageRecords {
    let mut page = PageRecords::new();
    for r in records {
        page.insert(r).unwrap();
    }
    page
}

fn listing() -> ListingState {
    ListingState::new(
        "my-addon".to_string(),
        "4".to_string(),
        "tok".to_string(),
        vec![
            page(vec![
                record(1, 0, "1.0", FileStatus::Approved),
                record(2, 1, "1.1", FileStatus::Deleted),
                record(3, 2, "1.2", FileStatus::AwaitingReview),
            ]),
            page(vec![
                record(4, 0, "1.2", FileStatus::Deleted),
                record(5, 1, "1.3", FileStatus::Disabled),
            ]),
        ],
    )
}

fn statuses(state: &ListingState) -> Vec<(u64, FileStatus)> {
    state.files().map(|f| (f.id, f.status)).collect()
}

#[test]
fn files_flattens_pages_in_order() {
    let state = listing();
    let ids: Vec<u64> = state.files().map(|f| f.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    assert_eq!(state.file_count(), 5);
    assert_eq!(state.page_count(), 2);
}

#[test]
fn edits_through_files_mut_are_visible() {
    let mut state = listing();
    if let Some(file) = state.files_mut().find(|f| f.id == 5) {
        file.status = FileStatus::Approved;
    }
    assert_eq!(state.pages()[1].get(1).unwrap().status, FileStatus::Approved);
}

#[test]
fn disable_all_leaves_deleted_files_alone() {
    let mut state = listing();
    let touched = state.disable_all_files();
    assert_eq!(touched, 3);
    assert_eq!(
        statuses(&state),
        vec![
            (1, FileStatus::Disabled),
            (2, FileStatus::Deleted),
            (3, FileStatus::Disabled),
            (4, FileStatus::Deleted),
            (5, FileStatus::Disabled),
        ]
    );
}

#[test]
fn enable_all_approves_deleted_files_too() {
    let mut state = listing();
    let touched = state.enable_all_files();
    assert_eq!(touched, 5);
    assert!(state.files().all(|f| f.status == FileStatus::Approved));
}

#[test]
fn enable_versions_skips_deleted_files() {
    let mut state = listing();
    let touched = state.enable_versions(&["1.1", "1.2"]);
    assert_eq!(touched, 1);
    assert_eq!(
        statuses(&state),
        vec![
            (1, FileStatus::Approved),
            (2, FileStatus::Deleted),
            (3, FileStatus::Approved),
            (4, FileStatus::Deleted),
            (5, FileStatus::Disabled),
        ]
    );
}

#[test]
fn disable_versions_includes_deleted_files() {
    let mut state = listing();
    let touched = state.disable_versions(&["1.2".to_string()]);
    assert_eq!(touched, 2);
    assert_eq!(
        statuses(&state),
        vec![
            (1, FileStatus::Approved),
            (2, FileStatus::Deleted),
            (3, FileStatus::Disabled),
            (4, FileStatus::Disabled),
            (5, FileStatus::Disabled),
        ]
    );
}

#[test]
fn unknown_versions_touch_nothing() {
    let mut state = listing();
    let before = state.clone();
    assert_eq!(state.disable_versions(&["9.9"]), 0);
    assert_eq!(state, before);
}

#[test]
fn duplicate_slot_is_rejected() {
    let mut page = PageRecords::new();
    page.insert(record(1, 3, "1.0", FileStatus::Approved)).unwrap();
    let err = page
        .insert(record(2, 3, "1.0", FileStatus::Approved))
        .unwrap_err();
    assert_eq!(err.slot, 3);
    assert_eq!(err.existing_id, 1);
    assert_eq!(err.rejected_id, 2);
    assert_eq!(err.to_string(), "form slot 3 claimed by files 1 and 2");
    assert_eq!(page.len(), 1);
}
