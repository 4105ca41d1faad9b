//! AMO core: pure listing model, status rules, commit form building and
//! reporting queries.
mod form;
mod listing;
mod page;
mod queries;
mod record;
mod sql;
mod status;

pub use form::{build_page_form, FORM_PREFIX, MIN_MAX_NUM_FORMS};
pub use listing::ListingState;
pub use page::{DuplicateSlot, FormSlot, PageRecords};
pub use queries::{
    all_ids_query, involved_accounts_query, map_ids_query, users_for_ids_query, AddonColumn,
    AddonType, UnknownName, REUSED_GUID_PREFIX,
};
pub use record::{FileRecord, VersionInfo};
pub use sql::{quote_literal, SqlBuilder, SqlError, Table};
pub use status::{FileStatus, UnknownStatus};
