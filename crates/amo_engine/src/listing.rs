use std::sync::Arc;

use amo_core::{FileRecord, ListingState};
use amo_logging::{amo_debug, amo_info};
use futures_util::future::try_join_all;

use crate::commit::{commit_listing, CommitReport};
use crate::page::fetch_listing_page;
use crate::{ConsoleConfig, ConsoleError, DecodeError, Transport};

/// File listing of one add-on on the admin console.
///
/// Loading reconciles every listing page into one record index; the bulk
/// operations mutate that index in place and, with autocommit on, write every
/// page straight back.
pub struct AddonListing {
    transport: Arc<dyn Transport>,
    admin_base: String,
    addon: String,
    autocommit: bool,
    state: Option<ListingState>,
}

impl AddonListing {
    /// `addon` may be the numeric id, the slug or the GUID.
    pub fn new(transport: Arc<dyn Transport>, config: &ConsoleConfig, addon: impl Into<String>) -> Self {
        Self {
            transport,
            admin_base: config.admin_base(),
            addon: addon.into(),
            autocommit: true,
            state: None,
        }
    }

    pub fn with_autocommit(mut self, autocommit: bool) -> Self {
        self.autocommit = autocommit;
        self
    }

    pub fn autocommit(&self) -> bool {
        self.autocommit
    }

    pub fn set_autocommit(&mut self, autocommit: bool) {
        self.autocommit = autocommit;
    }

    /// Canonical slug once loaded, the caller's identifier before.
    pub fn addon_slug(&self) -> &str {
        self.state
            .as_ref()
            .map_or(self.addon.as_str(), |state| state.slug.as_str())
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_some()
    }

    pub fn state(&self) -> Option<&ListingState> {
        self.state.as_ref()
    }

    pub fn page_count(&self) -> Option<usize> {
        self.state.as_ref().map(ListingState::page_count)
    }

    /// Every file across all pages; empty until loaded.
    pub fn files(&self) -> impl Iterator<Item = &FileRecord> {
        self.state.iter().flat_map(ListingState::files)
    }

    pub fn files_mut(&mut self) -> impl Iterator<Item = &mut FileRecord> {
        self.state.iter_mut().flat_map(ListingState::files_mut)
    }

    /// Fetch page 1, then the remaining pages concurrently, replacing any
    /// previous state. On failure the listing is left unloaded.
    pub async fn load(&mut self) -> Result<&ListingState, ConsoleError> {
        self.state = None;
        let transport = self.transport.as_ref();
        let admin_base = self.admin_base.as_str();

        amo_info!("Loading file listing for {}", self.addon);
        let first = fetch_listing_page(transport, admin_base, &self.addon, 1).await?;
        let status = first
            .status
            .ok_or(DecodeError::MissingPageField("add-on status"))?;
        let token = first
            .token
            .ok_or(DecodeError::MissingPageField("csrf token"))?;
        let slug = first.slug;
        let page_count = first.page_count;
        amo_debug!("{} resolved to {} with {} pages", self.addon, slug, page_count);

        let rest = try_join_all(
            (2..=page_count).map(|number| fetch_listing_page(transport, admin_base, &slug, number)),
        )
        .await?;

        let mut pages = Vec::with_capacity(page_count);
        pages.push(first.records);
        pages.extend(rest.into_iter().map(|page| page.records));

        let state = self
            .state
            .insert(ListingState::new(slug, status, token, pages));
        amo_info!(
            "Loaded {} files on {} pages for {}",
            state.file_count(),
            state.page_count(),
            state.slug
        );
        Ok(&*state)
    }

    /// Load once; later calls are no-ops until [`AddonListing::reload`].
    pub async fn ensure_loaded(&mut self) -> Result<&mut ListingState, ConsoleError> {
        if self.state.is_none() {
            self.load().await?;
        }
        self.state
            .as_mut()
            .ok_or_else(|| ConsoleError::NotLoaded(self.addon.clone()))
    }

    pub async fn reload(&mut self) -> Result<&ListingState, ConsoleError> {
        self.load().await
    }

    /// Approve every file, deleted ones included.
    pub async fn enable_all_files(&mut self) -> Result<usize, ConsoleError> {
        let touched = self.ensure_loaded().await?.enable_all_files();
        self.finish_mutation("enable all files", touched).await
    }

    /// Disable every file that is not deleted.
    pub async fn disable_all_files(&mut self) -> Result<usize, ConsoleError> {
        let touched = self.ensure_loaded().await?.disable_all_files();
        self.finish_mutation("disable all files", touched).await
    }

    /// Approve the non-deleted files of the named versions.
    pub async fn enable_versions<S: AsRef<str>>(&mut self, names: &[S]) -> Result<usize, ConsoleError> {
        let touched = self.ensure_loaded().await?.enable_versions(names);
        self.finish_mutation("enable versions", touched).await
    }

    /// Disable every file of the named versions, deleted ones included.
    pub async fn disable_versions<S: AsRef<str>>(&mut self, names: &[S]) -> Result<usize, ConsoleError> {
        let touched = self.ensure_loaded().await?.disable_versions(names);
        self.finish_mutation("disable versions", touched).await
    }

    /// Write every page back to the console.
    pub async fn commit(&self) -> Result<CommitReport, ConsoleError> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| ConsoleError::NotLoaded(self.addon.clone()))?;
        commit_listing(self.transport.as_ref(), &self.admin_base, state).await
    }

    async fn finish_mutation(&self, action: &str, touched: usize) -> Result<usize, ConsoleError> {
        amo_debug!("{}: {} files touched on {}", action, touched, self.addon_slug());
        if self.autocommit {
            self.commit().await?;
        }
        Ok(touched)
    }
}
