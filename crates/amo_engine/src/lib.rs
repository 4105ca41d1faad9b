//! AMO engine: console session, listing reconciliation and commits, plus
//! the Redash and Bugzilla clients moderation work leans on.
mod bugzilla;
mod commit;
mod config;
mod decode;
mod error;
mod listing;
mod page;
mod redash;
mod rows;
mod transport;
mod types;
mod user;

pub use bugzilla::{Account, Bug, BugzillaClient, Comment};
pub use commit::{commit_listing, CommitReport};
pub use config::{
    default_rc_path, load_config, AuthConfig, BugzillaConfig, ConsoleConfig, RedashConfig,
    DEFAULT_BUGZILLA_BASE, DEFAULT_IDENTITY_HOST, DEFAULT_INTERNAL_BASE, DEFAULT_LOCALE,
    DEFAULT_PUBLIC_BASE, DEFAULT_REDASH_BASE, DEFAULT_REDASH_DATA_SOURCE, HOST_ENV, RC_FILENAME,
};
pub use decode::{decode_body, CharsetError, CharsetOrigin, DecodedBody};
pub use error::{
    ApiError, CommitAggregateError, ConfigError, ConsoleError, DecodeError, PageFailure, PageFailureCause,
};
pub use listing::AddonListing;
pub use page::{fetch_listing_page, manage_url, parse_listing_page, resolve_slug, ListingPage};
pub use redash::{AddonUser, RedashClient, Row};
pub use rows::{form_slot, FileColumns, RowDecoder, RowKind};
pub use transport::{ReqwestSession, SessionSettings, SessionSetupError, Transport};
pub use types::{ConsoleRequest, ConsoleResponse, FailureKind, Method, TransportError};
pub use user::UserAdminPage;
